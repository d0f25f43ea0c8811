//! KDL parsing helper functions.
//!
//! Common utilities for extracting values from KDL nodes.

use anyhow::Result;
use ::kdl::{KdlDocument, KdlNode, KdlValue};

/// Convert a byte offset to line and column numbers (1-indexed)
pub fn offset_to_line_col(content: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in content.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn first_value<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|n| n.entries().first())
        .map(|e| e.value())
}

/// Get the first argument of the node `name` as a string
pub fn get_string(doc: &KdlDocument, name: &str) -> Option<String> {
    first_value(doc, name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// Get the first argument of the node `name` as a boolean
pub fn get_bool(doc: &KdlDocument, name: &str) -> Option<bool> {
    first_value(doc, name).and_then(|v| v.as_bool())
}

/// Get the first argument of the node `name` as a non-negative integer
///
/// Present-but-invalid values are an error rather than silently defaulted.
pub fn get_u64(doc: &KdlDocument, name: &str) -> Result<Option<u64>> {
    let Some(value) = first_value(doc, name) else {
        return Ok(None);
    };
    let int = value
        .as_integer()
        .ok_or_else(|| anyhow::anyhow!("'{}' must be an integer, got {}", name, value))?;
    u64::try_from(int)
        .map(Some)
        .map_err(|_| anyhow::anyhow!("'{}' must be a non-negative integer, got {}", name, int))
}

/// Get every argument of the node `name` as strings
pub fn get_string_args(doc: &KdlDocument, name: &str) -> Vec<String> {
    doc.get(name)
        .map(|n| {
            n.entries()
                .iter()
                .filter_map(|e| e.value().as_string())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Helper to get a string entry from a KDL block node
pub fn get_string_entry(node: &KdlNode, name: &str) -> Option<String> {
    node.children().and_then(|children| get_string(children, name))
}

/// Helper to get a boolean entry from a KDL block node
pub fn get_bool_entry(node: &KdlNode, name: &str) -> Option<bool> {
    node.children().and_then(|children| get_bool(children, name))
}

/// Helper to get an integer entry from a KDL block node
pub fn get_u64_entry(node: &KdlNode, name: &str) -> Result<Option<u64>> {
    match node.children() {
        Some(children) => get_u64(children, name),
        None => Ok(None),
    }
}
