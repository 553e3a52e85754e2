use super::attributes::{infer_attribute_fields, metadata_label};
use super::audit::ItemAudit;
use super::dedup::{sibling_roles, SiblingRole};
use super::field::{derive_source_uid, derive_uid, humanize, join_label, join_uid, Field, FieldType};
use crate::parser::BlockNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Text-bearing leaf, mapped to rich text.
    Text,
    Media,
    Link,
    /// Wraps its classified children in a group.
    Container,
    /// Group whose children are inferred from the block's attributes.
    AttributeGroup,
}

impl BlockKind {
    fn leaf_type(self) -> Option<FieldType> {
        match self {
            BlockKind::Text => Some(FieldType::Json),
            BlockKind::Media => Some(FieldType::File),
            BlockKind::Link => Some(FieldType::Link),
            BlockKind::Container | BlockKind::AttributeGroup => None,
        }
    }
}

pub const BLOCK_KINDS: &[(&str, BlockKind)] = &[
    ("core/paragraph", BlockKind::Text),
    ("core/heading", BlockKind::Text),
    ("core/list-item", BlockKind::Text),
    ("core/code", BlockKind::Text),
    ("core/table", BlockKind::Text),
    ("core/html", BlockKind::Text),
    ("core/preformatted", BlockKind::Text),
    ("core/verse", BlockKind::Text),
    ("core/pullquote", BlockKind::Text),
    ("core/freeform", BlockKind::Text),
    ("core/shortcode", BlockKind::Text),
    ("core/footnotes", BlockKind::Text),
    ("core/image", BlockKind::Media),
    ("core/audio", BlockKind::Media),
    ("core/video", BlockKind::Media),
    ("core/file", BlockKind::Media),
    ("core/gallery", BlockKind::Media),
    ("core/navigation-link", BlockKind::Link),
    ("core/social-link", BlockKind::Link),
    ("core/page-list-item", BlockKind::Link),
    ("core/group", BlockKind::Container),
    ("core/quote", BlockKind::Container),
    ("core/cover", BlockKind::Container),
    ("core/list", BlockKind::Container),
    ("core/navigation", BlockKind::Container),
    ("core/navigation-submenu", BlockKind::Container),
    ("core/social-links", BlockKind::Container),
    ("core/buttons", BlockKind::Container),
    ("core/details", BlockKind::Container),
    ("core/columns", BlockKind::Container),
    ("core/column", BlockKind::Container),
    ("core/media-text", BlockKind::Container),
    ("core/button", BlockKind::AttributeGroup),
    ("core/search", BlockKind::AttributeGroup),
    ("core/site-logo", BlockKind::AttributeGroup),
    ("core/site-title", BlockKind::AttributeGroup),
    ("core/site-tagline", BlockKind::AttributeGroup),
    ("core/post-date", BlockKind::AttributeGroup),
    ("core/embed", BlockKind::AttributeGroup),
];

pub fn block_kind(name: &str) -> Option<BlockKind> {
    BLOCK_KINDS
        .iter()
        .find(|(block, _)| *block == name)
        .map(|(_, kind)| *kind)
}

/// Uid and label of the enclosing field; absent at the root.
#[derive(Debug, Clone, Copy)]
pub struct Parent<'a> {
    pub uid: &'a str,
    pub label: &'a str,
}

/// Maps block trees to fields. Output order is the node's own field first,
/// then its descendants depth-first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier<'a> {
    affix: Option<&'a str>,
}

impl<'a> Classifier<'a> {
    pub fn new(affix: Option<&'a str>) -> Self {
        Self { affix }
    }

    pub fn classify(
        &self,
        node: &BlockNode,
        parent: Option<Parent<'_>>,
        audit: &mut ItemAudit<'_>,
    ) -> Vec<Field> {
        let Some(kind) = block_kind(&node.name) else {
            audit.skipped(&node.name, format!("unmapped block {} ({})", node.name, node.instance_id));
            return Vec::new();
        };

        if let Some(leaf) = kind.leaf_type() {
            return vec![self.own_field(node, parent, leaf)];
        }

        let group_type = if parent.is_none() {
            FieldType::ModularBlockChild
        } else {
            FieldType::Group
        };
        let group = self.own_field(node, parent, group_type);
        let children = {
            let scope = Parent {
                uid: &group.target_field_uid,
                label: &group.target_field_name,
            };
            match kind {
                BlockKind::AttributeGroup => infer_attribute_fields(
                    &node.attributes,
                    &group.source_uid,
                    scope.uid,
                    scope.label,
                    self.affix,
                ),
                _ => self.classify_siblings(&node.children, Some(scope), audit),
            }
        };

        if children.is_empty() {
            audit.skipped(
                &group.target_field_uid,
                format!("{} has no classifiable children", node.name),
            );
            return Vec::new();
        }

        let mut fields = Vec::with_capacity(children.len() + 1);
        fields.push(group);
        fields.extend(children);
        fields
    }

    /// Classify a sibling list, classifying each repeated shape once and
    /// flagging it `multiple`.
    pub fn classify_siblings(
        &self,
        siblings: &[BlockNode],
        parent: Option<Parent<'_>>,
        audit: &mut ItemAudit<'_>,
    ) -> Vec<Field> {
        self.classify_each(siblings, parent, audit)
            .into_iter()
            .flat_map(|(_, fields)| fields)
            .collect()
    }

    /// Like `classify_siblings` but keeps each classified sibling's fields
    /// apart, paired with the node that produced them.
    pub fn classify_each<'n>(
        &self,
        siblings: &'n [BlockNode],
        parent: Option<Parent<'_>>,
        audit: &mut ItemAudit<'_>,
    ) -> Vec<(&'n BlockNode, Vec<Field>)> {
        let roles = sibling_roles(siblings);
        let mut classified = Vec::new();

        for (node, role) in siblings.iter().zip(roles) {
            match role {
                SiblingRole::First { repeats } => {
                    let mut produced = self.classify(node, parent, audit);
                    if produced.is_empty() {
                        continue;
                    }
                    if repeats > 0 {
                        produced[0].attributes.multiple = true;
                    }
                    classified.push((node, produced));
                }
                SiblingRole::RepeatOf(first) => {
                    audit.merged(
                        &node.name,
                        format!(
                            "{} ({}) repeats sibling {}",
                            node.name, node.instance_id, siblings[first].instance_id
                        ),
                    );
                }
            }
        }
        classified
    }

    fn own_field(&self, node: &BlockNode, parent: Option<Parent<'_>>, field_type: FieldType) -> Field {
        let segment = derive_uid(&node.name, &node.instance_id, self.affix);
        let label = metadata_label(&node.attributes)
            .map(str::to_string)
            .unwrap_or_else(|| humanize(&node.name));

        Field::new(
            derive_source_uid(&node.name, &node.instance_id, self.affix),
            label.clone(),
            node.name.clone(),
            join_label(parent.map(|p| p.label), &label),
            join_uid(parent.map(|p| p.uid), &segment),
            field_type,
        )
    }
}
