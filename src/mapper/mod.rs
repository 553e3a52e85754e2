pub mod attributes;
pub mod audit;
pub mod classify;
pub mod content_type;
pub mod dedup;
pub mod field;
pub mod references;
pub mod taxonomy;

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use rayon::prelude::*;
use tracing::info;

use crate::export::{Export, ItemGroup};
use crate::parser::{BlockTreeProvider, CommentGrammar};
use audit::AuditLog;
use content_type::{ContentType, ContentTypeBuilder, ContentTypeKind};
use taxonomy::TermIndex;

/// Post types that hold assets, menus or editor state rather than content.
pub const DEFAULT_EXCLUDED_TYPES: &[&str] = &[
    "attachment",
    "nav_menu_item",
    "revision",
    "customize_changeset",
    "oembed_cache",
    "custom_css",
    "wp_global_styles",
    "wp_font_family",
    "wp_font_face",
];

#[derive(Debug, Clone)]
pub struct MapperOptions {
    /// Namespace for identifiers that collide with reserved words.
    pub affix: Option<String>,
    pub excluded_types: Vec<String>,
    /// Post types emitted as global fields instead of content types.
    pub global_fields: Vec<String>,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            affix: None,
            excluded_types: DEFAULT_EXCLUDED_TYPES.iter().map(|s| s.to_string()).collect(),
            global_fields: Vec::new(),
        }
    }
}

impl MapperOptions {
    pub fn is_excluded(&self, post_type: &str) -> bool {
        self.excluded_types.iter().any(|t| t == post_type)
    }

    pub fn kind_of(&self, post_type: &str) -> ContentTypeKind {
        if self.global_fields.iter().any(|t| t == post_type) {
            ContentTypeKind::GlobalField
        } else {
            ContentTypeKind::ContentType
        }
    }

    fn affix(&self) -> Option<&str> {
        self.affix.as_deref().filter(|a| !a.is_empty())
    }
}

pub struct MappingRun {
    pub content_types: Vec<ContentType>,
    pub audit: AuditLog,
}

/// Map every item of one post type, sequentially, into one content type.
/// `stop` is checked before each item; once set the group fails.
pub fn map_group(
    group: &ItemGroup<'_>,
    terms: &TermIndex<'_>,
    provider: &dyn BlockTreeProvider,
    options: &MapperOptions,
    stop: &AtomicBool,
) -> Result<(ContentType, AuditLog)> {
    let mut builder = ContentTypeBuilder::new(
        group.post_type,
        options.kind_of(group.post_type),
        options.affix(),
        terms,
        provider,
    );
    for (done, item) in group.items.iter().enumerate() {
        if stop.load(Ordering::Relaxed) {
            bail!("Mapping of {} stopped after {} items", group.post_type, done);
        }
        builder.add_item(item);
    }
    let (ct, audit) = builder.finish();
    info!(
        "Mapped {} ({} items) to {} fields",
        ct.target_uid,
        group.items.len(),
        ct.fields.len()
    );
    Ok((ct, audit))
}

/// Map all post types in parallel, one content type per worker, calling
/// `on_done` as each finishes. Output order follows the export. Setting
/// `stop` makes every worker give up at its next item.
pub fn map_export_with<F>(
    export: &Export,
    provider: &dyn BlockTreeProvider,
    options: &MapperOptions,
    stop: &AtomicBool,
    on_done: F,
) -> Result<MappingRun>
where
    F: Fn(&ContentType) + Sync,
{
    let terms = TermIndex::new(&export.terms);
    if terms.is_empty() {
        info!("Export has no taxonomy terms, category fields will carry no terms");
    } else {
        info!("Indexed {} taxonomy terms", terms.len());
    }
    let groups: Vec<ItemGroup<'_>> = export
        .items_by_type()
        .into_iter()
        .filter(|g| {
            let excluded = options.is_excluded(g.post_type);
            if excluded {
                info!("Skipping excluded post type {} ({} items)", g.post_type, g.items.len());
            }
            !excluded
        })
        .collect();

    let results: Vec<(ContentType, AuditLog)> = groups
        .par_iter()
        .map(|group| -> Result<(ContentType, AuditLog)> {
            let result = map_group(group, &terms, provider, options, stop)?;
            on_done(&result.0);
            Ok(result)
        })
        .collect::<Result<_>>()?;

    let mut audit = AuditLog::new();
    let mut content_types = Vec::with_capacity(results.len());
    for (ct, log) in results {
        content_types.push(ct);
        audit.extend(log);
    }
    let targets = references::reference_targets(&content_types);
    content_types.extend(targets);

    Ok(MappingRun {
        content_types,
        audit,
    })
}

pub fn map_export(export: &Export, options: &MapperOptions) -> Result<MappingRun> {
    map_export_with(export, &CommentGrammar, options, &AtomicBool::new(false), |_| {})
}
