use serde_json::Value;
use tracing::warn;

use super::field::{
    apply_affix, join_label, join_uid, sanitize_uid, Field, FieldType, RESERVED_FIELD_UIDS,
};

/// Attribute key that carries editor metadata (a custom block label under
/// `metadata.name`); it never becomes a field itself.
pub const METADATA_KEY: &str = "metadata";

/// Human label a block's author gave it in the editor, if any.
pub fn metadata_label(attributes: &Value) -> Option<&str> {
    attributes
        .get(METADATA_KEY)?
        .get("name")?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn infer_type(value: &Value) -> FieldType {
    match value {
        Value::Bool(_) => FieldType::Boolean,
        Value::Number(_) => FieldType::Number,
        _ => FieldType::SingleLineText,
    }
}

fn source_kind(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        _ => "null",
    }
}

/// One primitive field per scalar top-level attribute of a block.
///
/// Object and array values are skipped and nothing is recursed into.
pub fn infer_attribute_fields(
    attributes: &Value,
    source_prefix: &str,
    parent_uid: &str,
    parent_label: &str,
    affix: Option<&str>,
) -> Vec<Field> {
    let Some(bag) = attributes.as_object() else {
        warn!("Attribute bag of {} is not an object, skipping", parent_uid);
        return Vec::new();
    };

    let mut fields = Vec::new();
    for (key, value) in bag {
        if key == METADATA_KEY || value.is_object() || value.is_array() {
            continue;
        }
        let segment = sanitize_uid(key);
        if segment.is_empty() {
            warn!("Attribute key {:?} on {} has no usable characters", key, parent_uid);
            continue;
        }
        let segment = apply_affix(segment, RESERVED_FIELD_UIDS, affix);

        let mut field = Field::new(
            format!("{}_{}", source_prefix, sanitize_uid(key)),
            key.clone(),
            source_kind(value).to_string(),
            join_label(Some(parent_label), key),
            join_uid(Some(parent_uid), &segment),
            infer_type(value),
        );
        if !value.is_null() {
            field.attributes.default_value = Some(value.clone());
        }
        fields.push(field);
    }
    fields
}
