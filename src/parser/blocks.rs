use std::sync::LazyLock;

use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::BlockTreeProvider;

/// Opening, closing and void block delimiters:
/// `<!-- wp:ns/name {"a":1} -->`, `<!-- /wp:name -->`, `<!-- wp:name /-->`.
/// The attribute text never crosses a `-->`, so a malformed bag stays
/// inside its own delimiter.
static DELIMITER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<!--\s+(/)?wp:([a-z][a-z0-9_-]*/)?([a-z][a-z0-9_-]*)\s+((?:[^-]|-[^-]|--[^>])*?\s+)?(/)?-->",
    )
    .unwrap()
});

const DEFAULT_NAMESPACE: &str = "core/";
pub const FREEFORM_BLOCK: &str = "core/freeform";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockNode {
    pub name: String,
    pub instance_id: String,
    pub attributes: Value,
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    pub fn new(name: &str, instance_id: &str) -> Self {
        Self {
            name: name.to_string(),
            instance_id: instance_id.to_string(),
            attributes: Value::Object(Map::new()),
            children: Vec::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_children(mut self, children: Vec<BlockNode>) -> Self {
        self.children = children;
        self
    }

    /// Total node count including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(BlockNode::size).sum::<usize>()
    }
}

/// Parser for the block comment grammar embedded in `content:encoded`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommentGrammar;

impl BlockTreeProvider for CommentGrammar {
    fn parse(&self, raw: &str) -> Result<Vec<BlockNode>> {
        parse_blocks(raw)
    }
}

/// Open block on the parse stack; instance ids are assigned when the
/// finished tree is walked so they only depend on document order.
struct Frame {
    name: String,
    attributes: Value,
    children: Vec<BlockNode>,
}

pub fn parse_blocks(raw: &str) -> Result<Vec<BlockNode>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut roots: Vec<BlockNode> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut cursor = 0;

    for caps in DELIMITER_RE.captures_iter(raw) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((cursor, cursor));

        // ── Freeform HTML between root-level blocks ──
        if stack.is_empty() {
            push_freeform(&raw[cursor..whole.0], &mut roots);
        }
        cursor = whole.1;

        let namespace = caps.get(2).map_or(DEFAULT_NAMESPACE, |m| m.as_str());
        let name = format!("{}{}", namespace, &caps[3]);
        let is_closer = caps.get(1).is_some();
        let is_void = caps.get(5).is_some();

        if is_closer {
            let Some(frame) = stack.pop() else {
                warn!("Stray closing delimiter for {}, ignoring", name);
                continue;
            };
            if frame.name != name {
                bail!("Mismatched closing delimiter: expected {}, found {}", frame.name, name);
            }
            let node = BlockNode {
                name: frame.name,
                instance_id: String::new(),
                attributes: frame.attributes,
                children: frame.children,
            };
            attach(node, &mut stack, &mut roots);
            continue;
        }

        let attributes = parse_attributes(&name, caps.get(4).map(|m| m.as_str()));
        if is_void {
            let node = BlockNode {
                name,
                instance_id: String::new(),
                attributes,
                children: Vec::new(),
            };
            attach(node, &mut stack, &mut roots);
        } else {
            stack.push(Frame {
                name,
                attributes,
                children: Vec::new(),
            });
        }
    }

    // Trailing text inside an unclosed block belongs to that block
    if stack.is_empty() {
        push_freeform(&raw[cursor..], &mut roots);
    }

    // Unclosed blocks at end of input are closed implicitly
    while let Some(frame) = stack.pop() {
        warn!("Block {} was never closed", frame.name);
        let node = BlockNode {
            name: frame.name,
            instance_id: String::new(),
            attributes: frame.attributes,
            children: frame.children,
        };
        attach(node, &mut stack, &mut roots);
    }

    assign_instance_ids(&mut roots, "");
    Ok(roots)
}

fn attach(node: BlockNode, stack: &mut [Frame], roots: &mut Vec<BlockNode>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn push_freeform(html: &str, roots: &mut Vec<BlockNode>) {
    let html = html.trim();
    if html.is_empty() {
        return;
    }
    let mut attributes = Map::new();
    attributes.insert("content".to_string(), Value::String(html.to_string()));
    roots.push(BlockNode {
        name: FREEFORM_BLOCK.to_string(),
        instance_id: String::new(),
        attributes: Value::Object(attributes),
        children: Vec::new(),
    });
}

/// Malformed JSON degrades to an empty bag instead of failing the item.
fn parse_attributes(name: &str, raw: Option<&str>) -> Value {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Value::Object(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => {
            warn!("Attributes of {} are not an object, ignoring", name);
            Value::Object(Map::new())
        }
        Err(e) => {
            warn!("Malformed attributes on {}: {}", name, e);
            Value::Object(Map::new())
        }
    }
}

fn assign_instance_ids(nodes: &mut [BlockNode], prefix: &str) {
    for (i, node) in nodes.iter_mut().enumerate() {
        node.instance_id = if prefix.is_empty() {
            i.to_string()
        } else {
            format!("{}-{}", prefix, i)
        };
        let id = node.instance_id.clone();
        assign_instance_ids(&mut node.children, &id);
    }
}
