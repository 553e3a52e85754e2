use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::mapper::audit::AuditLog;
use crate::mapper::content_type::{ContentType, ContentTypeKind};
use crate::mapper::field::Field;

const AUDIT_FILE: &str = "audit.json";

/// Record status for a content type whose schema has been mapped.
pub const STATUS_MAPPED: u8 = 1;

/// Persisted form of a content type. Key order is part of the contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeRecord<'a> {
    pub status: u8,
    pub is_updated: bool,
    pub update_at: String,
    pub other_cms_title: &'a str,
    pub other_cms_uid: &'a str,
    pub contentstack_title: &'a str,
    pub contentstack_uid: &'a str,
    #[serde(rename = "type")]
    pub kind: ContentTypeKind,
    pub field_mapping: &'a [Field],
}

impl ContentType {
    pub fn to_record(&self, updated_at: DateTime<Utc>) -> ContentTypeRecord<'_> {
        ContentTypeRecord {
            status: STATUS_MAPPED,
            is_updated: false,
            update_at: updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            other_cms_title: &self.source_title,
            other_cms_uid: &self.source_uid,
            contentstack_title: &self.target_title,
            contentstack_uid: &self.target_uid,
            kind: self.kind,
            field_mapping: &self.fields,
        }
    }
}

/// Write one pretty-printed `<uid>.json` per content type plus `audit.json`.
pub async fn write_records(out_dir: &Path, content_types: &[ContentType], audit: &AuditLog) -> Result<()> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create output dir {}", out_dir.display()))?;

    let now = Utc::now();
    for ct in content_types {
        let path = out_dir.join(format!("{}.json", ct.target_uid));
        let json = serde_json::to_string_pretty(&ct.to_record(now))?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let path = out_dir.join(AUDIT_FILE);
    tokio::fs::write(&path, serde_json::to_string_pretty(audit)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(
        "Wrote {} content types and {} audit entries to {}",
        content_types.len(),
        audit.entries().len(),
        out_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn post() -> ContentType {
        let mut ct = ContentType::new("post", None, ContentTypeKind::ContentType);
        ct.fields = vec![Field::title(), Field::url()];
        ct
    }

    #[test]
    fn record_keys_keep_contract_order() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(post().to_record(at)).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "status",
                "isUpdated",
                "updateAt",
                "otherCmsTitle",
                "otherCmsUid",
                "contentstackTitle",
                "contentstackUid",
                "type",
                "fieldMapping",
            ]
        );
        assert_eq!(json["status"], 1);
        assert_eq!(json["isUpdated"], false);
        assert_eq!(json["updateAt"], "2024-05-01T12:00:00.000Z");
        assert_eq!(json["contentstackTitle"], "Post");
        assert_eq!(json["type"], "content_type");
    }

    #[test]
    fn field_rows_use_wire_names() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(post().to_record(at)).unwrap();
        let title = &json["fieldMapping"][0];
        assert_eq!(title["contentstackFieldUid"], "title");
        assert_eq!(title["contentstackFieldType"], "text");
        assert_eq!(title["advanced"]["mandatory"], true);
        assert_eq!(title["isDeleted"], false);
        assert!(matches!(title["advanced"]["unique"], Value::Bool(true)));
    }

    #[tokio::test]
    async fn writes_one_file_per_type_and_audit() {
        let dir = std::env::temp_dir().join(format!("wxr_mapper_out_{}", std::process::id()));
        let global = ContentType::new("footer", None, ContentTypeKind::GlobalField);
        write_records(&dir, &[post(), global], &AuditLog::new()).await.unwrap();

        let post_json: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("post.json")).unwrap()).unwrap();
        assert_eq!(post_json["contentstackUid"], "post");
        let footer_json: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("footer.json")).unwrap()).unwrap();
        assert_eq!(footer_json["type"], "global_field");
        let audit = std::fs::read_to_string(dir.join("audit.json")).unwrap();
        assert_eq!(audit.trim(), "[]");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
