use serde::Serialize;

use super::audit::{AuditAction, AuditLog, ItemAudit};
use super::classify::Classifier;
use super::dedup::{is_exact_duplicate, match_reusable_group, GroupDecision};
use super::field::{
    apply_affix, derive_uid, humanize, sanitize_uid, Field, FieldType, RESERVED_CONTENT_TYPE_UIDS,
};
use super::references::{AUTHORS_UID, TERMS_UID};
use super::taxonomy::{TermIndex, CATEGORY_DOMAIN};
use crate::export::ExportItem;
use crate::parser::{BlockNode, BlockTreeProvider};

pub const CATEGORY_FIELD: &str = "category";
pub const TERMS_FIELD: &str = "terms";
pub const AUTHOR_FIELD: &str = "author";

/// Relationship fields always close the field list in this order.
const RELATION_ORDER: &[&str] = &[CATEGORY_FIELD, TERMS_FIELD, AUTHOR_FIELD];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypeKind {
    ContentType,
    GlobalField,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentType {
    pub source_title: String,
    pub source_uid: String,
    pub target_title: String,
    pub target_uid: String,
    pub fields: Vec<Field>,
    pub kind: ContentTypeKind,
}

impl ContentType {
    pub fn new(post_type: &str, affix: Option<&str>, kind: ContentTypeKind) -> Self {
        Self {
            source_title: post_type.to_string(),
            source_uid: post_type.to_string(),
            target_title: humanize(post_type),
            target_uid: apply_affix(sanitize_uid(post_type), RESERVED_CONTENT_TYPE_UIDS, affix),
            fields: Vec::new(),
            kind,
        }
    }

    pub fn field(&self, target_uid: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.target_field_uid == target_uid)
    }

    /// Content type uids this type's reference fields point at.
    pub fn referenced_types(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = Vec::new();
        for uid in self.fields.iter().flat_map(|f| &f.attributes.reference_to) {
            if !refs.contains(&uid.as_str()) {
                refs.push(uid);
            }
        }
        refs
    }
}

/// Accumulates the schema of one post type item by item.
///
/// Items must be fed sequentially: every root field is checked against the
/// fields emitted by earlier items.
pub struct ContentTypeBuilder<'a> {
    content_type: ContentType,
    classifier: Classifier<'a>,
    affix: Option<&'a str>,
    terms: &'a TermIndex<'a>,
    provider: &'a dyn BlockTreeProvider,
    has_body: bool,
    fields: Vec<Field>,
    relations: Vec<Field>,
    audit: AuditLog,
}

impl<'a> ContentTypeBuilder<'a> {
    pub fn new(
        post_type: &str,
        kind: ContentTypeKind,
        affix: Option<&'a str>,
        terms: &'a TermIndex<'a>,
        provider: &'a dyn BlockTreeProvider,
    ) -> Self {
        Self {
            content_type: ContentType::new(post_type, affix, kind),
            classifier: Classifier::new(affix),
            affix,
            terms,
            provider,
            has_body: false,
            fields: Vec::new(),
            relations: Vec::new(),
            audit: AuditLog::new(),
        }
    }

    pub fn add_item(&mut self, item: &ExportItem) {
        let mut log = std::mem::take(&mut self.audit);
        let post_type = self.content_type.source_uid.clone();
        {
            let mut audit = log.for_item(&post_type, &item.id);
            self.add_blocks(item, &mut audit);
            self.add_relations(item, &mut audit);
        }
        self.audit = log;
    }

    fn add_blocks(&mut self, item: &ExportItem, audit: &mut ItemAudit<'_>) {
        if !item.has_body() {
            return;
        }
        self.has_body = true;

        let blocks = match self.provider.parse(&item.body) {
            Ok(blocks) => blocks,
            Err(e) => {
                audit.record(None, AuditAction::ParseFailed, e.to_string());
                return;
            }
        };

        let classifier = self.classifier;
        for (node, fields) in classifier.classify_each(&blocks, None, audit) {
            self.merge_root(item, node, fields, audit);
        }
    }

    /// Cross-item pass for one classified root block.
    fn merge_root(
        &mut self,
        item: &ExportItem,
        node: &BlockNode,
        mut fields: Vec<Field>,
        audit: &mut ItemAudit<'_>,
    ) {
        let Some(root) = fields.first() else {
            return;
        };
        if root.target_field_type != FieldType::ModularBlockChild {
            self.append(fields, audit);
            return;
        }

        match match_reusable_group(&fields[1..], &self.fields) {
            GroupDecision::Reuse { existing_uid } => {
                audit.deduplicated(
                    &root.target_field_uid,
                    format!(
                        "{} deduplicated against {} ({} fields dropped)",
                        root.target_field_uid,
                        existing_uid,
                        fields.len()
                    ),
                );
                if let Some(existing) = self
                    .fields
                    .iter_mut()
                    .find(|f| f.target_field_uid == existing_uid)
                {
                    existing.attributes.multiple = true;
                }
            }
            GroupDecision::Append => {
                if self.has_uid(&root.target_field_uid) {
                    // Same uid, different shape: qualify the instance id with the item
                    let qualified = derive_uid(
                        &node.name,
                        &format!("{}-{}", item.id, node.instance_id),
                        self.affix,
                    );
                    if self.has_uid(&qualified) {
                        audit.skipped(&root.target_field_uid, format!("uid {} already taken", qualified));
                        return;
                    }
                    let old = root.target_field_uid.clone();
                    requalify(&mut fields, &old, &qualified);
                }
                self.append(fields, audit);
            }
        }
    }

    /// Fields of a dropped group are dropped with it.
    fn append(&mut self, fields: Vec<Field>, audit: &mut ItemAudit<'_>) {
        let mut dropped: Vec<String> = Vec::new();
        for field in fields {
            if dropped.iter().any(|uid| field.is_descendant_of(uid)) {
                continue;
            }
            let reason = if self.has_uid(&field.target_field_uid) {
                Some("already mapped")
            } else if is_exact_duplicate(&field, &self.fields) {
                Some("duplicates an existing field")
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    audit.merged(
                        &field.target_field_uid,
                        format!("{} {}", field.target_field_uid, reason),
                    );
                    dropped.push(field.target_field_uid);
                }
                None => self.fields.push(field),
            }
        }
    }

    fn add_relations(&mut self, item: &ExportItem, audit: &mut ItemAudit<'_>) {
        let resolution = self.terms.resolve(&item.categories);
        for missing in &resolution.unresolved {
            audit.record(
                None,
                AuditAction::Unresolved,
                format!("category {:?} is not in the term list", missing.slug),
            );
        }

        if item.categories.iter().any(|c| c.domain == CATEGORY_DOMAIN) {
            self.ensure_relation(Field::taxonomy(CATEGORY_FIELD, "Category", Vec::new()));
            if let Some(category) = self.relation_mut(CATEGORY_FIELD) {
                for term in resolution.categories {
                    if !category.attributes.terms.contains(&term.uid) {
                        category.attributes.terms.push(term.uid);
                    }
                }
            }
        }
        if !resolution.others.is_empty() {
            self.ensure_relation(Field::reference(TERMS_FIELD, "Terms", &[TERMS_UID], true));
        }
        if item.author.is_some() {
            self.ensure_relation(Field::reference(AUTHOR_FIELD, "Author", &[AUTHORS_UID], false));
        }
    }

    /// Insert a relationship field unless one with the same uid exists.
    fn ensure_relation(&mut self, field: Field) {
        if self.relation_mut(&field.target_field_uid).is_none() {
            self.relations.push(field);
        }
    }

    fn relation_mut(&mut self, uid: &str) -> Option<&mut Field> {
        self.relations.iter_mut().find(|f| f.target_field_uid == uid)
    }

    fn has_uid(&self, uid: &str) -> bool {
        self.fields.iter().any(|f| f.target_field_uid == uid)
    }

    pub fn finish(mut self) -> (ContentType, AuditLog) {
        let mut fields = vec![Field::title(), Field::url()];
        if self.has_body {
            fields.push(Field::modular_blocks());
        }
        fields.append(&mut self.fields);
        self.relations.sort_by_key(|f| {
            RELATION_ORDER
                .iter()
                .position(|uid| *uid == f.target_field_uid)
                .unwrap_or(RELATION_ORDER.len())
        });
        fields.append(&mut self.relations);

        self.content_type.fields = fields;
        (self.content_type, self.audit)
    }
}

/// Swap the root uid prefix of a group and all its descendants.
fn requalify(fields: &mut [Field], old_root: &str, new_root: &str) {
    for field in fields {
        if let Some(rest) = field.target_field_uid.strip_prefix(old_root) {
            let uid = format!("{}{}", new_root, rest);
            field.backup_field_uid = uid.clone();
            field.target_field_uid = uid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{Term, TermAssignment};
    use crate::parser::CommentGrammar;
    use std::collections::HashSet;

    const QUOTE_A: &str = "<!-- wp:quote --><!-- wp:paragraph --><p>One</p><!-- /wp:paragraph --><!-- wp:heading --><h2>A</h2><!-- /wp:heading --><!-- /wp:quote -->";
    const QUOTE_B: &str = "<!-- wp:paragraph --><p>Intro</p><!-- /wp:paragraph --><!-- wp:quote --><!-- wp:heading --><h2>B</h2><!-- /wp:heading --><!-- wp:paragraph --><p>Two</p><!-- /wp:paragraph --><!-- /wp:quote -->";

    fn item(id: &str, body: &str) -> ExportItem {
        ExportItem {
            id: id.into(),
            title: format!("Item {}", id),
            post_type: "post".into(),
            body: body.into(),
            ..Default::default()
        }
    }

    fn build(items: &[ExportItem], terms: &[Term]) -> (ContentType, AuditLog) {
        let index = TermIndex::new(terms);
        let mut builder = ContentTypeBuilder::new(
            "post",
            ContentTypeKind::ContentType,
            None,
            &index,
            &CommentGrammar,
        );
        for item in items {
            builder.add_item(item);
        }
        builder.finish()
    }

    fn uids(ct: &ContentType) -> Vec<&str> {
        ct.fields.iter().map(|f| f.target_field_uid.as_str()).collect()
    }

    fn assert_unique_uids(ct: &ContentType) {
        let mut seen = HashSet::new();
        for uid in uids(ct) {
            assert!(seen.insert(uid), "duplicate uid {}", uid);
        }
    }

    #[test]
    fn repeated_quote_shape_is_emitted_once() {
        let (ct, log) = build(&[item("1", QUOTE_A), item("2", QUOTE_B)], &[]);
        let groups: Vec<&Field> = ct
            .fields
            .iter()
            .filter(|f| f.target_field_type == FieldType::ModularBlockChild)
            .collect();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].attributes.multiple);
        let children = ct
            .fields
            .iter()
            .filter(|f| f.is_descendant_of(&groups[0].target_field_uid))
            .count();
        assert_eq!(children, 2);
        assert_eq!(log.count(AuditAction::Deduplicated), 1);
        assert_unique_uids(&ct);
    }

    #[test]
    fn dedup_keeps_one_field_set_in_either_order() {
        let (forward, _) = build(&[item("1", QUOTE_A), item("2", QUOTE_B)], &[]);
        let (backward, _) = build(&[item("2", QUOTE_B), item("1", QUOTE_A)], &[]);
        for ct in [&forward, &backward] {
            let count = ct
                .fields
                .iter()
                .filter(|f| f.target_field_type == FieldType::ModularBlockChild)
                .count();
            assert_eq!(count, 1);
            assert_unique_uids(ct);
        }
    }

    #[test]
    fn fixed_fields_lead_in_order() {
        let (ct, _) = build(&[item("1", QUOTE_A)], &[]);
        assert_eq!(&uids(&ct)[..3], &["title", "url", "modular_blocks"]);
        assert_eq!(ct.fields[0].target_field_type, FieldType::Text);
        assert_eq!(ct.fields[2].target_field_type, FieldType::ModularBlocks);
    }

    #[test]
    fn empty_bodies_add_no_modular_blocks() {
        let (ct, _) = build(&[item("1", "   ")], &[]);
        assert_eq!(uids(&ct), vec!["title", "url"]);

        let (mixed, _) = build(&[item("1", ""), item("2", QUOTE_A)], &[]);
        assert_eq!(mixed.fields[2].target_field_uid, "modular_blocks");
    }

    #[test]
    fn different_shapes_with_same_uid_are_requalified() {
        let other = "<!-- wp:quote --><!-- wp:image /--><!-- /wp:quote -->";
        let (ct, _) = build(&[item("1", QUOTE_A), item("7", other)], &[]);
        assert!(ct.field("core_quote_0").is_some());
        assert!(ct.field("core_quote_7_0").is_some());
        assert!(ct.field("core_quote_7_0.core_image_0_0").is_some());
        assert_unique_uids(&ct);
    }

    #[test]
    fn same_root_leaf_across_items_is_merged() {
        let p = "<!-- wp:paragraph --><p>x</p><!-- /wp:paragraph -->";
        let (ct, log) = build(&[item("1", p), item("2", p)], &[]);
        assert_eq!(uids(&ct), vec!["title", "url", "modular_blocks", "core_paragraph_0"]);
        assert_eq!(log.count(AuditAction::Merged), 1);
    }

    #[test]
    fn identical_leaf_in_another_group_is_merged() {
        let group = "<!-- wp:group --><!-- wp:paragraph --><p>x</p><!-- /wp:paragraph --><!-- wp:image /--><!-- /wp:group -->";
        let (ct, log) = build(&[item("1", QUOTE_A), item("2", group)], &[]);
        assert!(ct.field("core_quote_0.core_paragraph_0_0").is_some());
        assert!(ct.field("core_group_0").is_some());
        assert!(ct.field("core_group_0.core_image_0_1").is_some());
        assert!(ct.field("core_group_0.core_paragraph_0_0").is_none());
        assert_eq!(log.count(AuditAction::Merged), 1);
        assert_unique_uids(&ct);
    }

    #[test]
    fn same_segment_with_other_label_is_kept() {
        let group = r#"<!-- wp:group --><!-- wp:paragraph {"metadata":{"name":"Lead"}} --><p>x</p><!-- /wp:paragraph --><!-- wp:image /--><!-- /wp:group -->"#;
        let (ct, log) = build(&[item("1", QUOTE_A), item("2", group)], &[]);
        assert!(ct.field("core_group_0.core_paragraph_0_0").is_some());
        assert_eq!(log.count(AuditAction::Merged), 0);
    }

    #[test]
    fn unknown_blocks_do_not_stop_the_item() {
        let body = "<!-- wp:acme/widget /--><!-- wp:image /-->";
        let (ct, log) = build(&[item("1", body)], &[]);
        assert!(ct.field("core_image_1").is_some());
        assert_eq!(log.count(AuditAction::Skipped), 1);
    }

    #[test]
    fn parse_failures_yield_no_blocks() {
        let broken = "<!-- wp:group --><!-- wp:paragraph --><!-- /wp:group -->";
        let (ct, log) = build(&[item("1", broken)], &[]);
        assert_eq!(uids(&ct), vec!["title", "url", "modular_blocks"]);
        assert_eq!(log.count(AuditAction::ParseFailed), 1);
    }

    #[test]
    fn relations_are_added_once_in_fixed_order() {
        let terms = vec![
            Term {
                id: 1,
                slug: "news".into(),
                name: "News".into(),
                parent_slug: None,
                domain: "category".into(),
                description: None,
            },
            Term {
                id: 2,
                slug: "tech".into(),
                name: "Tech".into(),
                parent_slug: Some("news".into()),
                domain: "category".into(),
                description: None,
            },
        ];
        let mut first = item("1", "");
        first.author = Some("jdoe".into());
        first.categories.push(TermAssignment {
            slug: "rust".into(),
            domain: "post_tag".into(),
            name: "Rust".into(),
        });
        let mut second = item("2", "");
        second.author = Some("rroe".into());
        second.categories = vec![
            TermAssignment {
                slug: "tech".into(),
                domain: "category".into(),
                name: "Tech".into(),
            },
            TermAssignment {
                slug: "ghost".into(),
                domain: "category".into(),
                name: "Ghost".into(),
            },
        ];
        let mut third = item("3", "");
        third.categories.push(TermAssignment {
            slug: "news".into(),
            domain: "category".into(),
            name: "News".into(),
        });

        let (ct, log) = build(&[first, second, third], &terms);
        assert_eq!(uids(&ct), vec!["title", "url", "category", "terms", "author"]);
        let category = ct.field("category").unwrap();
        assert_eq!(category.target_field_type, FieldType::Taxonomy);
        assert_eq!(category.attributes.terms, vec!["news_1".to_string()]);
        assert_eq!(ct.field("author").unwrap().attributes.reference_to, vec!["authors".to_string()]);
        assert_eq!(ct.referenced_types(), vec!["terms", "authors"]);
        assert_eq!(log.count(AuditAction::Unresolved), 1);
    }

    #[test]
    fn reserved_post_type_uid_takes_affix() {
        let ct = ContentType::new("entry", Some("wp"), ContentTypeKind::ContentType);
        assert_eq!(ct.target_uid, "wp_entry");
        assert_eq!(ct.target_title, "Entry");
    }
}
