use std::collections::HashMap;

use super::field::{Field, FieldType};
use crate::parser::BlockNode;

/// Where a sibling stands relative to the siblings before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingRole {
    /// First of its shape; classified, `repeats` later siblings share it.
    First { repeats: usize },
    /// Same shape as the sibling at this index; not classified again.
    RepeatOf(usize),
}

/// Block name plus the sorted multiset of its direct children's names.
fn sibling_signature(node: &BlockNode) -> (&str, Vec<&str>) {
    let mut names: Vec<&str> = node.children.iter().map(|c| c.name.as_str()).collect();
    names.sort_unstable();
    (node.name.as_str(), names)
}

/// Sibling-group pass over one list of siblings.
pub fn sibling_roles(siblings: &[BlockNode]) -> Vec<SiblingRole> {
    let mut first_by_signature: HashMap<(&str, Vec<&str>), usize> = HashMap::new();
    let mut roles: Vec<SiblingRole> = Vec::with_capacity(siblings.len());

    for (i, node) in siblings.iter().enumerate() {
        let signature = sibling_signature(node);
        if let Some(&first) = first_by_signature.get(&signature) {
            if let SiblingRole::First { repeats } = &mut roles[first] {
                *repeats += 1;
            }
            roles.push(SiblingRole::RepeatOf(first));
        } else {
            first_by_signature.insert(signature, i);
            roles.push(SiblingRole::First { repeats: 0 });
        }
    }
    roles
}

pub type ShapeSignature = Vec<(FieldType, bool)>;

/// Sorted `(type, multiple)` pairs of every field below a group, nested
/// groups' fields included; labels and uids do not take part.
pub fn shape_signature(descendants: &[Field]) -> ShapeSignature {
    let mut signature: ShapeSignature = descendants
        .iter()
        .map(|f| (f.target_field_type, f.attributes.multiple))
        .collect();
    signature.sort_unstable();
    signature
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupDecision {
    /// An existing reusable group has the same shape; drop the candidate.
    Reuse { existing_uid: String },
    Append,
}

/// Cross-item reusable-group pass: compare a candidate group's shape with
/// every `modular_block_child` already in the content type.
pub fn match_reusable_group(descendants: &[Field], existing: &[Field]) -> GroupDecision {
    let candidate = shape_signature(descendants);

    for group in existing
        .iter()
        .filter(|f| f.target_field_type == FieldType::ModularBlockChild)
    {
        let children: Vec<Field> = existing
            .iter()
            .filter(|f| f.is_descendant_of(&group.target_field_uid))
            .cloned()
            .collect();
        if children.len() == descendants.len() && shape_signature(&children) == candidate {
            return GroupDecision::Reuse {
                existing_uid: group.target_field_uid.clone(),
            };
        }
    }
    GroupDecision::Append
}

/// Same last uid segment, same type and same last label segment.
pub fn is_exact_duplicate(candidate: &Field, existing: &[Field]) -> bool {
    existing.iter().any(|f| {
        f.uid_segment() == candidate.uid_segment()
            && f.target_field_type == candidate.target_field_type
            && f.label_segment() == candidate.label_segment()
    })
}
