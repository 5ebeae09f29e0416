use crate::ruleset::{Ruleset, SectionSpec};
use crate::types::{NormalizedDocument, SectionValue};
use std::collections::BTreeMap;

pub const IDENTITY_ID: &str = "identity";

/// Fixed identity fields, present even when the ruleset declares no children.
pub const IDENTITY_FIELDS: [&str; 4] = ["name", "surname", "avs", "full_name"];

/// Empty document shaped like the ruleset: sections with children become
/// nodes keyed by the child's last id component, other sections are `""`.
pub fn default_template(ruleset: &Ruleset) -> NormalizedDocument {
    let mut doc = NormalizedDocument::new();
    for section in ruleset.roots() {
        doc.root_mut()
            .insert(section.key().to_string(), skeleton_for(ruleset, section));
    }
    doc
}

fn skeleton_for(ruleset: &Ruleset, section: &SectionSpec) -> SectionValue {
    let is_identity = section.id == IDENTITY_ID;
    if !section.has_children() && !is_identity {
        return SectionValue::default();
    }

    let mut node = BTreeMap::new();
    if is_identity {
        for field in IDENTITY_FIELDS {
            node.insert(field.to_string(), SectionValue::default());
        }
    }
    for child in ruleset.children_of(section) {
        node.insert(child.key().to_string(), skeleton_for(ruleset, child));
    }
    SectionValue::Node(node)
}
