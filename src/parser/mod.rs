pub mod blocks;

use anyhow::Result;

pub use blocks::{BlockNode, CommentGrammar};

/// Turns the raw marked-up body of one item into a block tree.
///
/// Implementations must be pure: the same input always yields the same
/// tree, instance ids included, so identifiers derived from it are stable.
pub trait BlockTreeProvider: Sync {
    fn parse(&self, raw: &str) -> Result<Vec<BlockNode>>;
}
