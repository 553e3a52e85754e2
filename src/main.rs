use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use wxr_mapper::export::{self, Export};
use wxr_mapper::mapper::audit::AuditAction;
use wxr_mapper::mapper::{self, MapperOptions, MappingRun, DEFAULT_EXCLUDED_TYPES};
use wxr_mapper::output;
use wxr_mapper::parser::{BlockNode, BlockTreeProvider, CommentGrammar};

#[derive(Parser)]
#[command(name = "wxr_mapper", about = "Infer content type schemas from a WordPress WXR export")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map every post type to a content type schema and write JSON records
    Map {
        /// Path to the WXR export
        export: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
        /// Prefix for identifiers that collide with reserved words
        #[arg(long)]
        affix: Option<String>,
        /// Post types to skip (replaces the default list when given)
        #[arg(long = "exclude-type")]
        exclude_type: Vec<String>,
        /// Post types to emit as global fields
        #[arg(long = "global-field")]
        global_field: Vec<String>,
        /// Abort mapping after this many seconds
        #[arg(long, default_value = "300")]
        timeout_secs: u64,
    },
    /// Post type, block and taxonomy statistics
    Stats {
        export: PathBuf,
    },
    /// Print the parsed block tree of one item
    Blocks {
        export: PathBuf,
        post_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Map {
            export: path,
            out,
            affix,
            exclude_type,
            global_field,
            timeout_secs,
        } => {
            let doc = export::read_export(&path).await?;
            let options = MapperOptions {
                affix,
                excluded_types: if exclude_type.is_empty() {
                    DEFAULT_EXCLUDED_TYPES.iter().map(|s| s.to_string()).collect()
                } else {
                    exclude_type
                },
                global_fields: global_field,
            };
            let run = map_with_progress(doc, options, Duration::from_secs(timeout_secs)).await?;
            if run.content_types.is_empty() {
                println!("No mappable post types found.");
                return Ok(());
            }

            println!("{:<24} | {:<14} | {:>6}", "Content type", "Kind", "Fields");
            println!("{}", "-".repeat(50));
            for ct in &run.content_types {
                println!(
                    "{:<24} | {:<14} | {:>6}",
                    truncate(&ct.target_uid, 24),
                    format!("{:?}", ct.kind),
                    ct.fields.len()
                );
            }
            if run.audit.is_empty() {
                println!("\nNo audit entries.");
            } else {
                println!(
                    "\n{} audit entries ({} skipped, {} merged, {} deduplicated, {} unresolved, {} parse failures)",
                    run.audit.entries().len(),
                    run.audit.count(AuditAction::Skipped),
                    run.audit.count(AuditAction::Merged),
                    run.audit.count(AuditAction::Deduplicated),
                    run.audit.count(AuditAction::Unresolved),
                    run.audit.count(AuditAction::ParseFailed),
                );
            }

            output::write_records(&out, &run.content_types, &run.audit).await?;
            println!("Wrote {} records to {}", run.content_types.len(), out.display());
            Ok(())
        }
        Commands::Stats { export: path } => {
            let doc = export::read_export(&path).await?;
            print_stats(&doc);
            Ok(())
        }
        Commands::Blocks { export: path, post_id } => {
            let doc = export::read_export(&path).await?;
            let Some(item) = doc.find_item(&post_id) else {
                bail!("No item with post id {}", post_id);
            };
            let blocks = CommentGrammar
                .parse(&item.body)
                .with_context(|| format!("Failed to parse blocks of item {}", post_id))?;
            println!("{}", serde_json::to_string_pretty(&blocks)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Run the mapper on the blocking pool, ticking a progress bar per post type.
async fn map_with_progress(
    doc: Export,
    options: MapperOptions,
    timeout: Duration,
) -> anyhow::Result<MappingRun> {
    let groups = doc
        .items_by_type()
        .iter()
        .filter(|g| !options.is_excluded(g.post_type))
        .count();

    let pb = ProgressBar::new(groups as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = stop.clone();
    let worker_pb = pb.clone();
    let mut task = tokio::task::spawn_blocking(move || {
        mapper::map_export_with(&doc, &CommentGrammar, &options, &worker_stop, |ct| {
            worker_pb.set_message(ct.target_uid.clone());
            worker_pb.inc(1);
        })
    });

    let run = match tokio::time::timeout(timeout, &mut task).await {
        Ok(joined) => joined.context("Mapping task panicked")??,
        Err(_) => {
            // Workers stop at their next item; wait so the runtime can shut down
            stop.store(true, Ordering::Relaxed);
            pb.abandon();
            let _ = task.await;
            bail!("Mapping did not finish within {}s", timeout.as_secs());
        }
    };
    pb.finish_and_clear();
    Ok(run)
}

fn print_stats(doc: &Export) {
    if let Some(title) = &doc.title {
        println!("Export: {}", title);
    }

    let mut histogram: HashMap<String, usize> = HashMap::new();
    let mut parse_errors = 0;

    println!("\n{:<24} | {:>6} | {:>7} | {:>6}", "Post type", "Items", "Bodies", "Blocks");
    println!("{}", "-".repeat(52));
    for group in doc.items_by_type() {
        let mut bodies = 0;
        let mut blocks = 0;
        for item in group.items.iter().filter(|i| i.has_body()) {
            bodies += 1;
            match CommentGrammar.parse(&item.body) {
                Ok(tree) => {
                    blocks += tree.iter().map(BlockNode::size).sum::<usize>();
                    count_blocks(&tree, &mut histogram);
                }
                Err(_) => parse_errors += 1,
            }
        }
        println!(
            "{:<24} | {:>6} | {:>7} | {:>6}",
            truncate(group.post_type, 24),
            group.items.len(),
            bodies,
            blocks
        );
    }

    let mut names: Vec<_> = histogram.into_iter().collect();
    names.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if !names.is_empty() {
        println!("\n--- Blocks ---");
        for (name, count) in &names {
            println!("  {:<32} {:>6}", truncate(name, 32), count);
        }
    }

    println!(
        "\n{} items | {} terms | {} authors | {} bodies failed to parse",
        doc.items.len(),
        doc.terms.len(),
        doc.authors.len(),
        parse_errors
    );
}

fn count_blocks(nodes: &[BlockNode], histogram: &mut HashMap<String, usize>) {
    for node in nodes {
        *histogram.entry(node.name.clone()).or_default() += 1;
        count_blocks(&node.children, histogram);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
