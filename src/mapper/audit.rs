use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Block produced no field (unknown name, empty container, bad attributes).
    Skipped,
    /// Field folded into an identical field already in the content type.
    Merged,
    /// Reusable group replaced by an existing group of the same shape.
    Deduplicated,
    /// Taxonomy assignment whose term is missing from the term list.
    Unresolved,
    /// Body markup could not be parsed; the item contributed no blocks.
    ParseFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub content_type: String,
    pub item_id: String,
    pub block: Option<String>,
    pub action: AuditAction,
    pub detail: String,
}

/// Per-run record of everything skipped or merged, for human review.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_item<'a>(&'a mut self, content_type: &'a str, item_id: &'a str) -> ItemAudit<'a> {
        ItemAudit {
            log: self,
            content_type,
            item_id,
        }
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn count(&self, action: AuditAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    pub fn extend(&mut self, other: AuditLog) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Audit handle scoped to one item of one content type.
pub struct ItemAudit<'a> {
    log: &'a mut AuditLog,
    content_type: &'a str,
    item_id: &'a str,
}

impl ItemAudit<'_> {
    pub fn record(&mut self, block: Option<&str>, action: AuditAction, detail: impl Into<String>) {
        let detail = detail.into();
        let block_label = block.unwrap_or("-");
        match action {
            AuditAction::Skipped | AuditAction::Unresolved | AuditAction::ParseFailed => warn!(
                "[{} #{}] {}: {}",
                self.content_type, self.item_id, block_label, detail
            ),
            AuditAction::Deduplicated => info!(
                "[{} #{}] {}: {}",
                self.content_type, self.item_id, block_label, detail
            ),
            AuditAction::Merged => debug!(
                "[{} #{}] {}: {}",
                self.content_type, self.item_id, block_label, detail
            ),
        }
        self.log.entries.push(AuditEntry {
            content_type: self.content_type.to_string(),
            item_id: self.item_id.to_string(),
            block: block.map(str::to_string),
            action,
            detail,
        });
    }

    pub fn skipped(&mut self, block: &str, detail: impl Into<String>) {
        self.record(Some(block), AuditAction::Skipped, detail);
    }

    pub fn merged(&mut self, block: &str, detail: impl Into<String>) {
        self.record(Some(block), AuditAction::Merged, detail);
    }

    pub fn deduplicated(&mut self, block: &str, detail: impl Into<String>) {
        self.record(Some(block), AuditAction::Deduplicated, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_carry_item_context() {
        let mut log = AuditLog::new();
        assert!(log.is_empty());
        {
            let mut audit = log.for_item("post", "42");
            audit.skipped("core/unknown_0", "unmapped block");
            audit.record(None, AuditAction::Unresolved, "category ghost not in term list");
        }
        assert!(!log.is_empty());
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.entries()[0].item_id, "42");
        assert_eq!(log.entries()[0].block.as_deref(), Some("core/unknown_0"));
        assert_eq!(log.count(AuditAction::Unresolved), 1);

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json[1]["action"], "unresolved");
    }
}
