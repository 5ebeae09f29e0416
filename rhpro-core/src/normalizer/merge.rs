//! Dotted-path writes into a `NormalizedDocument`.

use crate::types::{NormalizedDocument, SectionValue};
use std::collections::BTreeMap;

/// Key that keeps a parent's own text once children are nested under it.
pub const RAW_KEY: &str = "_raw";

/// Length ratio above which a new text replaces the existing one outright.
const REPLACE_RATIO: f64 = 1.5;

/// Write `value` at `path`, resolving collisions with what is already there:
///
/// - text over text: a value more than 1.5x longer replaces the old one,
///   otherwise both are joined by a blank line unless one contains the other;
/// - node over node: the existing node is kept;
/// - text over a node: an empty node is replaced, a node with content keeps
///   the text under `_raw`;
/// - a text found on the way to a deeper path becomes a node, with the old
///   text kept under `_raw` when it is not blank.
pub fn set_nested(doc: &mut NormalizedDocument, path: &str, value: SectionValue) {
    let keys: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = keys.split_last() else {
        return;
    };

    let mut current = doc.root_mut();
    for key in parents {
        let entry = current
            .entry((*key).to_string())
            .or_insert_with(SectionValue::empty_node);
        current = ensure_node(entry);
    }

    merge_into(current, last, value);
}

/// Turn a leaf into a node in place and hand back the node's map.
pub fn ensure_node(value: &mut SectionValue) -> &mut BTreeMap<String, SectionValue> {
    if let SectionValue::Leaf(old) = value {
        let mut node = BTreeMap::new();
        if !old.trim().is_empty() {
            node.insert(RAW_KEY.to_string(), SectionValue::Leaf(std::mem::take(old)));
        }
        *value = SectionValue::Node(node);
    }
    let SectionValue::Node(map) = value else {
        unreachable!("leaf values were converted to nodes above");
    };
    map
}

fn merge_into(map: &mut BTreeMap<String, SectionValue>, key: &str, value: SectionValue) {
    let Some(existing) = map.get_mut(key) else {
        if is_assignable(&value) {
            map.insert(key.to_string(), value);
        }
        return;
    };

    match value {
        SectionValue::Leaf(new) => {
            if new.is_empty() {
                return;
            }
            if let SectionValue::Leaf(old) = existing {
                merge_text(old, new);
                return;
            }
            if existing.has_content() {
                let node = ensure_node(existing);
                merge_into(node, RAW_KEY, SectionValue::Leaf(new));
            } else {
                *existing = SectionValue::Leaf(new);
            }
        }
        SectionValue::Node(node) => {
            if matches!(existing, SectionValue::Leaf(_)) {
                *existing = SectionValue::Node(node);
            }
        }
    }
}

fn merge_text(old: &mut String, new: String) {
    if new == *old {
        return;
    }
    let new_len = new.chars().count() as f64;
    let old_len = old.chars().count() as f64;
    if new_len > old_len * REPLACE_RATIO {
        *old = new;
    } else if !old.contains(new.as_str()) && !new.contains(old.as_str()) {
        old.push_str("\n\n");
        old.push_str(&new);
    }
}

fn is_assignable(value: &SectionValue) -> bool {
    match value {
        SectionValue::Leaf(text) => !text.is_empty(),
        SectionValue::Node(_) => true,
    }
}
