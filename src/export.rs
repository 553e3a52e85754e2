use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use tracing::{info, warn};

const DEFAULT_POST_TYPE: &str = "post";

/// Category/tag/term an item is filed under: `<category domain nicename>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermAssignment {
    pub slug: String,
    pub domain: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Term {
    pub id: u64,
    pub slug: String,
    pub name: String,
    pub parent_slug: Option<String>,
    pub domain: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Author {
    pub login: String,
    pub display_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub post_type: String,
    pub status: String,
    pub post_date: String,
    pub author: Option<String>,
    pub body: String,
    pub categories: Vec<TermAssignment>,
}

impl ExportItem {
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Export {
    pub title: Option<String>,
    pub items: Vec<ExportItem>,
    pub terms: Vec<Term>,
    pub authors: Vec<Author>,
}

/// Items sharing one post type, in export order.
#[derive(Debug, Clone)]
pub struct ItemGroup<'a> {
    pub post_type: &'a str,
    pub items: Vec<&'a ExportItem>,
}

impl Export {
    /// Group items by post type, ordered by first appearance.
    pub fn items_by_type(&self) -> Vec<ItemGroup<'_>> {
        let mut groups: Vec<ItemGroup<'_>> = Vec::new();
        for item in &self.items {
            match groups.iter_mut().find(|g| g.post_type == item.post_type) {
                Some(group) => group.items.push(item),
                None => groups.push(ItemGroup {
                    post_type: &item.post_type,
                    items: vec![item],
                }),
            }
        }
        groups
    }

    pub fn find_item(&self, id: &str) -> Option<&ExportItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

/// Read and parse a WXR export. Any I/O or XML error is fatal.
pub async fn read_export(path: &Path) -> Result<Export> {
    info!("Reading export: {}", path.display());
    let xml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read export {}", path.display()))?;
    let export = parse_export(&xml)
        .with_context(|| format!("Failed to parse export {}", path.display()))?;
    info!(
        "Export has {} items, {} terms, {} authors",
        export.items.len(),
        export.terms.len(),
        export.authors.len()
    );
    Ok(export)
}

pub fn parse_export(xml: &str) -> Result<Export> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut export = Export::default();
    let mut item: Option<ExportItem> = None;
    let mut author: Option<Author> = None;
    let mut term: Option<Term> = None;
    let mut category: Option<(String, String)> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                text.clear();
                match e.name().as_ref() {
                    b"item" => item = Some(ExportItem::default()),
                    b"category" if item.is_some() => category = Some(category_attributes(&e)?),
                    b"wp:author" if item.is_none() => author = Some(Author::default()),
                    b"wp:category" if item.is_none() => term = Some(empty_term("category")),
                    b"wp:tag" if item.is_none() => term = Some(empty_term("post_tag")),
                    b"wp:term" if item.is_none() => term = Some(empty_term("")),
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => text.push_str(&e.unescape()?),
            Ok(Event::CData(e)) => text.push_str(std::str::from_utf8(&e)?),
            Ok(Event::End(e)) => {
                let name = e.name();
                let name = name.as_ref();
                let value = std::mem::take(&mut text);
                let value = value.trim();

                if let Some(t) = term.as_mut() {
                    if end_term(t, name, value) {
                        if let Some(done) = term.take() {
                            export.terms.push(done);
                        }
                    }
                } else if let Some(a) = author.as_mut() {
                    if end_author(a, name, value) {
                        if let Some(done) = author.take() {
                            export.authors.push(done);
                        }
                    }
                } else if let Some(it) = item.as_mut() {
                    if name == b"category" {
                        if let Some((domain, slug)) = category.take() {
                            it.categories.push(TermAssignment {
                                slug,
                                domain,
                                name: value.to_string(),
                            });
                        }
                    } else if end_item(it, name, value) {
                        if let Some(mut done) = item.take() {
                            if done.post_type.is_empty() {
                                done.post_type = DEFAULT_POST_TYPE.to_string();
                            }
                            export.items.push(done);
                        }
                    }
                } else if name == b"title" && export.title.is_none() {
                    export.title = Some(value.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(export)
}

fn empty_term(domain: &str) -> Term {
    Term {
        id: 0,
        slug: String::new(),
        name: String::new(),
        parent_slug: None,
        domain: domain.to_string(),
        description: None,
    }
}

/// `(domain, nicename)` of an item's `<category>` element.
fn category_attributes(e: &BytesStart<'_>) -> Result<(String, String)> {
    let domain = match e.try_get_attribute("domain")? {
        Some(a) => a.unescape_value()?.to_string(),
        None => "category".to_string(),
    };
    let nicename = match e.try_get_attribute("nicename")? {
        Some(a) => a.unescape_value()?.to_string(),
        None => String::new(),
    };
    Ok((domain, nicename))
}

/// Returns true once the term element itself closes.
fn end_term(term: &mut Term, name: &[u8], value: &str) -> bool {
    match name {
        b"wp:term_id" => match value.parse() {
            Ok(id) => term.id = id,
            Err(_) => warn!("Term id {:?} is not numeric", value),
        },
        b"wp:category_nicename" | b"wp:tag_slug" | b"wp:term_slug" => term.slug = value.to_string(),
        b"wp:cat_name" | b"wp:tag_name" | b"wp:term_name" => term.name = value.to_string(),
        b"wp:category_parent" | b"wp:term_parent" => {
            term.parent_slug = Some(value.to_string()).filter(|p| !p.is_empty());
        }
        b"wp:term_taxonomy" => term.domain = value.to_string(),
        b"wp:category_description" | b"wp:tag_description" | b"wp:term_description" => {
            term.description = Some(value.to_string()).filter(|d| !d.is_empty());
        }
        b"wp:category" | b"wp:tag" | b"wp:term" => return true,
        _ => {}
    }
    false
}

fn end_author(author: &mut Author, name: &[u8], value: &str) -> bool {
    match name {
        b"wp:author_login" => author.login = value.to_string(),
        b"wp:author_display_name" => author.display_name = value.to_string(),
        b"wp:author_email" => author.email = value.to_string(),
        b"wp:author_first_name" => author.first_name = value.to_string(),
        b"wp:author_last_name" => author.last_name = value.to_string(),
        b"wp:author" => return true,
        _ => {}
    }
    false
}

fn end_item(item: &mut ExportItem, name: &[u8], value: &str) -> bool {
    match name {
        b"title" => item.title = value.to_string(),
        b"link" => item.link = value.to_string(),
        b"dc:creator" => item.author = Some(value.to_string()).filter(|a| !a.is_empty()),
        b"content:encoded" => item.body = value.to_string(),
        b"wp:post_id" => item.id = value.to_string(),
        b"wp:post_type" => item.post_type = value.to_string(),
        b"wp:status" => item.status = value.to_string(),
        b"wp:post_date" => item.post_date = value.to_string(),
        b"item" => return true,
        _ => {}
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Export {
        let xml = std::fs::read_to_string("tests/fixtures/blog.xml").unwrap();
        parse_export(&xml).unwrap()
    }

    #[test]
    fn reads_channel_terms_and_authors() {
        let export = fixture();
        assert_eq!(export.title.as_deref(), Some("Acme Blog"));
        assert_eq!(export.authors.len(), 2);
        assert_eq!(export.authors[0].login, "jdoe");
        assert_eq!(export.authors[0].display_name, "Jane Doe");

        let tech = export.terms.iter().find(|t| t.slug == "tech").unwrap();
        assert_eq!(tech.id, 2);
        assert_eq!(tech.domain, "category");
        assert_eq!(tech.parent_slug.as_deref(), Some("news"));

        let news = export.terms.iter().find(|t| t.slug == "news").unwrap();
        assert_eq!(news.parent_slug, None);

        assert!(export.terms.iter().any(|t| t.slug == "rust" && t.domain == "post_tag"));
        assert!(export.terms.iter().any(|t| t.slug == "beginner" && t.domain == "level"));
    }

    #[test]
    fn reads_items_with_cdata_bodies() {
        let export = fixture();
        let first = export.find_item("10").unwrap();
        assert_eq!(first.title, "Hello quotes");
        assert_eq!(first.post_type, "post");
        assert_eq!(first.author.as_deref(), Some("jdoe"));
        assert!(first.body.contains("<!-- wp:quote -->"));
        assert_eq!(
            first.categories,
            vec![
                TermAssignment {
                    slug: "tech".into(),
                    domain: "category".into(),
                    name: "Tech".into()
                },
                TermAssignment {
                    slug: "rust".into(),
                    domain: "post_tag".into(),
                    name: "Rust".into()
                },
            ]
        );
    }

    #[test]
    fn groups_items_by_type_in_order() {
        let export = fixture();
        let groups = export.items_by_type();
        let types: Vec<&str> = groups.iter().map(|g| g.post_type).collect();
        assert_eq!(types, vec!["post", "page", "attachment"]);
        assert_eq!(groups[0].items.len(), 3);
        assert!(!groups[0].items[2].has_body());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_export("<rss><channel><item></channel></rss>").is_err());
    }
}
