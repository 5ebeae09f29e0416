//! Coverage report: what was found, what is missing, leftover template
//! markers, and the production-gate decision built on top of them.

use crate::classifier::ProfileClassifier;
use crate::config::MatchMethod;
use crate::gate::{evaluate_production_gate, GateInput};
use crate::normalizer::template::IDENTITY_ID;
use crate::ruleset::Ruleset;
use crate::text::context_window;
use crate::types::{CoverageReport, FoundSection, NormalizedDocument, Placeholder, SectionValue, Segment};
use regex::Regex;
use std::sync::LazyLock;

/// Weights of the top-level keys in `weighted_coverage`.
pub const SECTION_WEIGHTS: [(&str, f64); 6] = [
    ("identity", 2.0),
    ("profession_formation", 3.0),
    ("orientation_formation", 3.0),
    ("tests", 2.0),
    ("competences", 1.5),
    ("conclusion", 1.5),
];

const DEFAULT_WEIGHT: f64 = 1.0;

/// Characters kept on each side of a placeholder match.
const PLACEHOLDER_CONTEXT: usize = 50;

struct PlaceholderPattern {
    label: &'static str,
    regex: Regex,
}

static PLACEHOLDER_PATTERNS: LazyLock<Vec<PlaceholderPattern>> = LazyLock::new(|| {
    [
        ("METTRE", r"\bMETTRE\b"),
        ("À COMPLÉTER", r"(?i)\b[àa]\s+compl[ée]ter"),
        ("TODO", r"\bTODO\b"),
        ("XXXX+", r"X{4,}"),
        ("...", r"\.{3}"),
        ("[ ]", r"\[\s*\]"),
        ("__+", r"_{2,}"),
    ]
    .into_iter()
    .map(|(label, pattern)| PlaceholderPattern {
        label,
        regex: Regex::new(pattern).expect("static placeholder regex"),
    })
    .collect()
});

pub fn section_weight(key: &str) -> f64 {
    SECTION_WEIGHTS
        .iter()
        .find(|(id, _)| *id == key)
        .map(|(_, weight)| *weight)
        .unwrap_or(DEFAULT_WEIGHT)
}

/// Whether `id` resolved to real content in `doc`.
///
/// The identity section counts as filled as soon as one of `avs`,
/// `full_name` or `name` is set.
pub fn is_section_filled(doc: &NormalizedDocument, id: &str) -> bool {
    let Some(value) = doc.get_path(id) else {
        return false;
    };
    if id == IDENTITY_ID {
        if let SectionValue::Node(_) = value {
            return ["avs", "full_name", "name"]
                .iter()
                .any(|field| value.get(field).is_some_and(SectionValue::has_content));
        }
    }
    value.has_content()
}

/// Σ(weight · filled) / Σ(weight) over the document's top-level keys.
pub fn weighted_coverage(doc: &NormalizedDocument) -> f64 {
    let mut total = 0.0;
    let mut filled = 0.0;
    for key in doc.root().keys() {
        let weight = section_weight(key);
        total += weight;
        if is_section_filled(doc, key) {
            filled += weight;
        }
    }
    if total > 0.0 {
        filled / total
    } else {
        0.0
    }
}

/// Every residual template marker in the document, one entry per
/// occurrence, in key order.
pub fn scan_placeholders(doc: &NormalizedDocument) -> Vec<Placeholder> {
    let mut found = Vec::new();
    for (key, value) in doc.root() {
        scan_value(key, value, &mut found);
    }
    found
}

fn scan_value(path: &str, value: &SectionValue, found: &mut Vec<Placeholder>) {
    match value {
        SectionValue::Leaf(text) => {
            for pattern in PLACEHOLDER_PATTERNS.iter() {
                for hit in pattern.regex.find_iter(text) {
                    found.push(Placeholder {
                        path: path.to_string(),
                        pattern: pattern.label.to_string(),
                        context: context_window(text, hit.start(), hit.end(), PLACEHOLDER_CONTEXT),
                    });
                }
            }
        }
        SectionValue::Node(map) => {
            for (key, child) in map {
                scan_value(&format!("{path}.{key}"), child, found);
            }
        }
    }
}

/// Assemble the coverage report for a normalized document.
///
/// `segments` are the segments kept after deduplication, mapped ones
/// first; they drive found and unknown titles. `all_segments` is the full
/// mapped list, duplicates included, scanned for profile keywords. The gate
/// profile is chosen automatically unless `gate_profile_override` names one.
pub fn build_report(
    ruleset: &Ruleset,
    doc: &NormalizedDocument,
    segments: &[Segment],
    all_segments: &[Segment],
    inline_warnings: &[String],
    gate_profile_override: Option<&str>,
) -> CoverageReport {
    let mut found_sections = Vec::new();
    let mut unknown_titles = Vec::new();
    let mut fuzzy_notes = Vec::new();
    for segment in segments {
        match &segment.mapped_section_id {
            Some(id) => {
                if segment.match_method == Some(MatchMethod::Fuzzy) {
                    fuzzy_notes.push(format!(
                        "Fuzzy title match: '{}' -> {} ({:.2})",
                        segment.normalized_title, id, segment.confidence
                    ));
                }
                found_sections.push(FoundSection {
                    id: id.clone(),
                    title: segment.normalized_title.clone(),
                    confidence: segment.confidence,
                    method: segment.match_method,
                });
            }
            None => unknown_titles.push(segment.normalized_title.clone()),
        }
    }

    let required = ruleset.required_ids();
    let missing_required: Vec<String> = required
        .iter()
        .filter(|id| !is_section_filled(doc, id))
        .map(|id| id.to_string())
        .collect();
    let missing_weighted: Vec<&str> = ruleset
        .weighted_ids()
        .into_iter()
        .filter(|id| !is_section_filled(doc, id))
        .collect();

    let total_sections = ruleset.sections().len();
    let coverage_ratio = if total_sections > 0 {
        found_sections.len() as f64 / total_sections as f64
    } else {
        0.0
    };
    // A ruleset without required sections reports 0.0 rather than 1.0, so
    // "ratio is 1.0 exactly when nothing required is missing" only holds
    // when at least one section is required.
    let required_coverage_ratio = if required.is_empty() {
        0.0
    } else {
        (required.len() - missing_required.len()) as f64 / required.len() as f64
    };

    let mut warnings: Vec<String> = missing_required
        .iter()
        .map(|id| format!("Required section missing: {id}"))
        .collect();
    warnings.extend(
        missing_weighted
            .iter()
            .map(|id| format!("Weighted section missing (not blocking): {id}")),
    );
    warnings.extend(inline_warnings.iter().cloned());
    warnings.extend(fuzzy_notes);

    let placeholders = scan_placeholders(doc);

    let selection =
        ProfileClassifier::new(ruleset).classify(all_segments, &found_sections, gate_profile_override);
    let gate_input = GateInput {
        missing_required: &missing_required,
        required_coverage_ratio,
        unknown_titles_count: unknown_titles.len(),
        placeholders_count: placeholders.len(),
    };
    let production_gate =
        evaluate_production_gate(ruleset, &selection.profile, selection.signals, &gate_input);

    tracing::debug!(
        found = found_sections.len(),
        missing_required = missing_required.len(),
        unknown = unknown_titles.len(),
        placeholders = placeholders.len(),
        status = %production_gate.status,
        "coverage report built"
    );

    CoverageReport {
        found_sections,
        missing_required_sections: missing_required,
        unknown_titles,
        coverage_ratio,
        required_coverage_ratio,
        weighted_coverage: weighted_coverage(doc),
        warnings,
        placeholders,
        production_gate,
    }
}
