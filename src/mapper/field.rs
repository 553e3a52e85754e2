use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uids the destination platform reserves for system fields.
pub const RESERVED_FIELD_UIDS: &[&str] = &[
    "acl", "api_key", "content_type", "created_at", "created_by", "deleted_at", "default_acl",
    "locale", "org_uid", "publish_details", "sys_acl", "tags", "title", "uid", "updated_at",
    "updated_by", "url", "_version", "_metadata", "_owner", "_in_progress", "_rules",
    "_content_type_uid", "_workflow",
];

/// Uids the destination platform reserves for content types.
pub const RESERVED_CONTENT_TYPE_UIDS: &[&str] = &[
    "asset", "assets", "content_type", "content_types", "entries", "entry", "environment",
    "environments", "global_field", "global_fields", "label", "labels", "locale", "locales",
    "release", "releases", "role", "roles", "stack", "stacks", "user", "users", "webhook",
    "webhooks", "workflow", "workflows", "taxonomy", "taxonomies",
];

pub const UID_SEPARATOR: char = '.';
pub const LABEL_SEPARATOR: &str = " > ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Entry title, system field only.
    Text,
    /// Entry url, system field only.
    Url,
    SingleLineText,
    /// Rich text stored as structured JSON.
    Json,
    File,
    Number,
    Boolean,
    Link,
    Group,
    /// Body container holding the reusable block children.
    ModularBlocks,
    ModularBlockChild,
    Reference,
    Taxonomy,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Url => "url",
            FieldType::SingleLineText => "single_line_text",
            FieldType::Json => "json",
            FieldType::File => "file",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Link => "link",
            FieldType::Group => "group",
            FieldType::ModularBlocks => "modular_blocks",
            FieldType::ModularBlockChild => "modular_block_child",
            FieldType::Reference => "reference",
            FieldType::Taxonomy => "taxonomy",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAttributes {
    pub mandatory: bool,
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terms: Vec<String>,
}

/// One row of the field mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "uid")]
    pub source_uid: String,
    #[serde(rename = "otherCmsField")]
    pub source_field_name: String,
    #[serde(rename = "otherCmsType")]
    pub source_field_type: String,
    #[serde(rename = "contentstackField")]
    pub target_field_name: String,
    #[serde(rename = "contentstackFieldUid")]
    pub target_field_uid: String,
    #[serde(rename = "contentstackFieldType")]
    pub target_field_type: FieldType,
    #[serde(rename = "backupFieldType")]
    pub backup_field_type: FieldType,
    #[serde(rename = "backupFieldUid")]
    pub backup_field_uid: String,
    #[serde(rename = "advanced")]
    pub attributes: FieldAttributes,
    #[serde(rename = "isDeleted")]
    pub deleted: bool,
}

impl Field {
    pub fn new(
        source_uid: String,
        source_field_name: String,
        source_field_type: String,
        target_field_name: String,
        target_field_uid: String,
        target_field_type: FieldType,
    ) -> Self {
        Self {
            source_uid,
            source_field_name,
            source_field_type,
            target_field_name,
            backup_field_uid: target_field_uid.clone(),
            target_field_uid,
            target_field_type,
            backup_field_type: target_field_type,
            attributes: FieldAttributes::default(),
            deleted: false,
        }
    }

    /// Fixed field whose source and target share one uid and label.
    pub fn system(uid: &str, label: &str, field_type: FieldType) -> Self {
        Self::new(
            uid.to_string(),
            label.to_string(),
            field_type.as_str().to_string(),
            label.to_string(),
            uid.to_string(),
            field_type,
        )
    }

    /// Shorthand for the mandatory, unique entry title.
    pub fn title() -> Self {
        let mut field = Self::system("title", "Title", FieldType::Text);
        field.attributes.mandatory = true;
        field.attributes.unique = true;
        field
    }

    /// Shorthand for the entry url.
    pub fn url() -> Self {
        Self::system("url", "Url", FieldType::Url)
    }

    /// Shorthand for the body container.
    pub fn modular_blocks() -> Self {
        let mut field = Self::system("modular_blocks", "Modular Blocks", FieldType::ModularBlocks);
        field.attributes.multiple = true;
        field
    }

    /// Shorthand for a reference field pointing at other content types.
    pub fn reference(uid: &str, label: &str, reference_to: &[&str], multiple: bool) -> Self {
        let mut field = Self::system(uid, label, FieldType::Reference);
        field.attributes.multiple = multiple;
        field.attributes.reference_to = reference_to.iter().map(|s| s.to_string()).collect();
        field
    }

    /// Shorthand for a taxonomy field carrying its term list.
    pub fn taxonomy(uid: &str, label: &str, terms: Vec<String>) -> Self {
        let mut field = Self::system(uid, label, FieldType::Taxonomy);
        field.attributes.multiple = true;
        field.attributes.terms = terms;
        field
    }

    /// Last `.`-separated segment of the target uid.
    pub fn uid_segment(&self) -> &str {
        last_uid_segment(&self.target_field_uid)
    }

    /// Last ` > `-separated segment of the target label.
    pub fn label_segment(&self) -> &str {
        self.target_field_name
            .rsplit(LABEL_SEPARATOR)
            .next()
            .unwrap_or(&self.target_field_name)
    }

    pub fn is_descendant_of(&self, ancestor_uid: &str) -> bool {
        self.target_field_uid
            .strip_prefix(ancestor_uid)
            .is_some_and(|rest| rest.starts_with(UID_SEPARATOR))
    }
}

pub fn last_uid_segment(uid: &str) -> &str {
    uid.rsplit(UID_SEPARATOR).next().unwrap_or(uid)
}

/// Lower-case, replace every non-alphanumeric character with `_` and
/// collapse runs of `_`.
pub fn sanitize_uid(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('_').to_string()
}

/// Namespace `uid` with the affix when it collides with `reserved`.
/// Without an affix reserved words pass through unmodified.
pub fn apply_affix(uid: String, reserved: &[&str], affix: Option<&str>) -> String {
    match affix.map(sanitize_uid).filter(|a| !a.is_empty()) {
        Some(affix) if reserved.contains(&uid.as_str()) => format!("{}_{}", affix, uid),
        _ => uid,
    }
}

/// Target uid segment for one block occurrence: `<name>_<instance id>`.
pub fn derive_uid(block_name: &str, instance_id: &str, affix: Option<&str>) -> String {
    let uid = sanitize_uid(&format!("{}_{}", block_name, instance_id));
    apply_affix(uid, RESERVED_FIELD_UIDS, affix)
}

/// Source uid for one block occurrence, namespaced by the affix when given.
pub fn derive_source_uid(block_name: &str, instance_id: &str, affix: Option<&str>) -> String {
    let uid = sanitize_uid(&format!("{}_{}", block_name, instance_id));
    match affix.map(sanitize_uid).filter(|a| !a.is_empty()) {
        Some(affix) => format!("{}_{}", affix, uid),
        None => uid,
    }
}

pub fn join_uid(parent: Option<&str>, segment: &str) -> String {
    match parent {
        Some(parent) => format!("{}{}{}", parent, UID_SEPARATOR, segment),
        None => segment.to_string(),
    }
}

pub fn join_label(parent: Option<&str>, label: &str) -> String {
    match parent {
        Some(parent) => format!("{}{}{}", parent, LABEL_SEPARATOR, label),
        None => label.to_string(),
    }
}

/// `core/social-link` → `Social Link`, `acme/hero_banner` → `Hero Banner`.
pub fn humanize(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
