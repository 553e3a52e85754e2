use std::collections::HashMap;

use crate::export::{Term, TermAssignment};

pub const CATEGORY_DOMAIN: &str = "category";

/// Top-level category an assignment rolls up to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTerm {
    pub slug: String,
    pub id: u64,
    /// `<slug>_<id>` composite used in the taxonomy field's term list.
    pub uid: String,
}

impl ResolvedTerm {
    fn from_term(term: &Term) -> Self {
        Self {
            slug: term.slug.clone(),
            id: term.id,
            uid: format!("{}_{}", term.slug, term.id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyResolution {
    pub categories: Vec<ResolvedTerm>,
    /// Assignments to any taxonomy other than categories.
    pub others: Vec<TermAssignment>,
    /// Category assignments whose slug is not in the term list.
    pub unresolved: Vec<TermAssignment>,
}

/// Read-only lookup over the export's flat term list, shared by all workers.
pub struct TermIndex<'a> {
    by_domain: HashMap<&'a str, HashMap<&'a str, &'a Term>>,
}

impl<'a> TermIndex<'a> {
    pub fn new(terms: &'a [Term]) -> Self {
        let mut by_domain: HashMap<&'a str, HashMap<&'a str, &'a Term>> = HashMap::new();
        for term in terms {
            by_domain
                .entry(term.domain.as_str())
                .or_default()
                .insert(term.slug.as_str(), term);
        }
        Self { by_domain }
    }

    pub fn get(&self, domain: &str, slug: &str) -> Option<&'a Term> {
        self.by_domain.get(domain)?.get(slug).copied()
    }

    pub fn len(&self) -> usize {
        self.by_domain.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Follows at most one parent link. A missing parent counts as topmost.
    pub fn top_ancestor(&self, term: &'a Term) -> &'a Term {
        term.parent_slug
            .as_deref()
            .filter(|p| !p.is_empty())
            .and_then(|p| self.get(&term.domain, p))
            .unwrap_or(term)
    }

    pub fn resolve(&self, assignments: &[TermAssignment]) -> TaxonomyResolution {
        let mut resolution = TaxonomyResolution::default();
        for assignment in assignments {
            if assignment.domain != CATEGORY_DOMAIN {
                resolution.others.push(assignment.clone());
                continue;
            }
            match self.get(CATEGORY_DOMAIN, &assignment.slug) {
                Some(term) => {
                    let top = ResolvedTerm::from_term(self.top_ancestor(term));
                    if !resolution.categories.contains(&top) {
                        resolution.categories.push(top);
                    }
                }
                None => resolution.unresolved.push(assignment.clone()),
            }
        }
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(id: u64, slug: &str, parent: Option<&str>) -> Term {
        Term {
            id,
            slug: slug.into(),
            name: slug.into(),
            parent_slug: parent.map(str::to_string),
            domain: CATEGORY_DOMAIN.into(),
            description: None,
        }
    }

    fn assign(slug: &str, domain: &str) -> TermAssignment {
        TermAssignment {
            slug: slug.into(),
            domain: domain.into(),
            name: slug.into(),
        }
    }

    #[test]
    fn one_hop_ancestor() {
        let terms = vec![term(1, "news", None), term(2, "tech", Some("news"))];
        let index = TermIndex::new(&terms);

        let child = index.resolve(&[assign("tech", "category")]);
        assert_eq!(child.categories.len(), 1);
        assert_eq!(child.categories[0].slug, "news");
        assert_eq!(child.categories[0].uid, "news_1");

        let top = index.resolve(&[assign("news", "category")]);
        assert_eq!(top.categories[0].slug, "news");
    }

    #[test]
    fn resolution_stops_after_one_hop() {
        let terms = vec![
            term(1, "world", None),
            term(2, "europe", Some("world")),
            term(3, "france", Some("europe")),
        ];
        let index = TermIndex::new(&terms);
        let r = index.resolve(&[assign("france", "category")]);
        assert_eq!(r.categories[0].slug, "europe");
    }

    #[test]
    fn missing_parent_counts_as_topmost() {
        let terms = vec![term(5, "orphan", Some("gone"))];
        let r = TermIndex::new(&terms).resolve(&[assign("orphan", "category")]);
        assert_eq!(r.categories[0].uid, "orphan_5");
    }

    #[test]
    fn unknown_slugs_and_other_taxonomies_are_reported() {
        let terms = vec![term(1, "news", None)];
        let r = TermIndex::new(&terms).resolve(&[
            assign("ghost", "category"),
            assign("rust", "post_tag"),
            assign("news", "category"),
            assign("news", "category"),
        ]);
        assert_eq!(r.categories.len(), 1);
        assert_eq!(r.unresolved, vec![assign("ghost", "category")]);
        assert_eq!(r.others, vec![assign("rust", "post_tag")]);
    }
}
