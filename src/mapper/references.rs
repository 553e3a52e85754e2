use tracing::info;

use super::content_type::{ContentType, ContentTypeKind};
use super::field::{Field, FieldType};

pub const AUTHORS_UID: &str = "authors";
pub const TERMS_UID: &str = "terms";

fn field(uid: &str, label: &str, field_type: FieldType) -> Field {
    Field::system(uid, label, field_type)
}

/// Fixed schema for the entries author reference fields point at.
pub fn authors_content_type() -> ContentType {
    let mut ct = ContentType::new(AUTHORS_UID, None, ContentTypeKind::ContentType);
    ct.fields = vec![
        Field::title(),
        Field::url(),
        field("email", "Email", FieldType::SingleLineText),
        field("first_name", "First Name", FieldType::SingleLineText),
        field("last_name", "Last Name", FieldType::SingleLineText),
        field("biographical_info", "Biographical Info", FieldType::Json),
    ];
    ct
}

/// Fixed schema for non-category taxonomy terms.
pub fn terms_content_type() -> ContentType {
    let mut ct = ContentType::new(TERMS_UID, None, ContentTypeKind::ContentType);
    ct.fields = vec![
        Field::title(),
        Field::url(),
        field("slug", "Slug", FieldType::SingleLineText),
        field("taxonomy", "Taxonomy", FieldType::SingleLineText),
        field("description", "Description", FieldType::Json),
        Field::reference("parent", "Parent", &[TERMS_UID], false),
    ];
    ct
}

/// Content types the mapped types reference but that the export itself
/// does not provide. A mapped post type with the same uid wins.
pub fn reference_targets(mapped: &[ContentType]) -> Vec<ContentType> {
    let mut targets: Vec<ContentType> = Vec::new();
    for uid in mapped.iter().flat_map(ContentType::referenced_types) {
        if mapped.iter().any(|ct| ct.target_uid == uid) || targets.iter().any(|ct| ct.target_uid == uid) {
            continue;
        }
        let target = match uid {
            AUTHORS_UID => authors_content_type(),
            TERMS_UID => terms_content_type(),
            _ => continue,
        };
        info!("Adding reference target content type {}", uid);
        targets.push(target);
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_refs(post_type: &str, refs: &[&str]) -> ContentType {
        let mut ct = ContentType::new(post_type, None, ContentTypeKind::ContentType);
        ct.fields = vec![Field::title(), Field::url(), Field::reference("r", "R", refs, true)];
        ct
    }

    #[test]
    fn targets_are_emitted_once() {
        let mapped = vec![
            with_refs("post", &[AUTHORS_UID]),
            with_refs("page", &[AUTHORS_UID, TERMS_UID]),
        ];
        let targets = reference_targets(&mapped);
        let uids: Vec<&str> = targets.iter().map(|t| t.target_uid.as_str()).collect();
        assert_eq!(uids, vec!["authors", "terms"]);
    }

    #[test]
    fn mapped_type_with_same_uid_wins() {
        let mapped = vec![with_refs("post", &[AUTHORS_UID]), with_refs("authors", &[])];
        assert!(reference_targets(&mapped).is_empty());
    }

    #[test]
    fn unknown_reference_targets_are_ignored() {
        let mapped = vec![with_refs("post", &["products"])];
        assert!(reference_targets(&mapped).is_empty());
    }

    #[test]
    fn fixed_schemas_start_with_title_and_url() {
        for ct in [authors_content_type(), terms_content_type()] {
            assert_eq!(ct.fields[0].target_field_uid, "title");
            assert_eq!(ct.fields[1].target_field_uid, "url");
        }
    }
}
