//! Builds the normalized document from mapped segments.
//!
//! Phases run once per call, in order: template, deduplication, fill,
//! inline split of composite parents, report.

pub mod identity;
pub mod inline;
pub mod merge;
pub mod template;

use crate::config::FillStrategy;
use crate::coverage::build_report;
use crate::ruleset::Ruleset;
use crate::text::snippet;
use crate::types::{
    CoverageReport, NormalizedDocument, ProvenanceEntry, ProvenanceMap, SectionValue, Segment,
};
use identity::{contains_avs, extract_identity};
use merge::{ensure_node, set_nested};
use std::collections::{BTreeMap, HashMap};
use template::{default_template, IDENTITY_ID};

/// Characters of body text kept in a provenance entry.
pub const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationOutput {
    pub normalized: NormalizedDocument,
    pub report: CoverageReport,
    pub provenance: ProvenanceMap,
}

pub struct Normalizer<'a> {
    ruleset: &'a Ruleset,
    template: Option<&'a NormalizedDocument>,
}

impl<'a> Normalizer<'a> {
    pub fn new(ruleset: &'a Ruleset) -> Self {
        Self {
            ruleset,
            template: None,
        }
    }

    /// Start from a caller-supplied skeleton instead of the one derived
    /// from the ruleset.
    pub fn with_template(mut self, template: &'a NormalizedDocument) -> Self {
        self.template = Some(template);
        self
    }

    pub fn normalize(
        &self,
        segments: &[Segment],
        gate_profile_override: Option<&str>,
    ) -> NormalizationOutput {
        let mut normalized = match self.template {
            Some(template) => template.clone(),
            None => default_template(self.ruleset),
        };

        let retained = deduplicate(segments);
        tracing::debug!(
            segments = segments.len(),
            retained = retained.len(),
            "segments deduplicated"
        );

        let mut provenance = ProvenanceMap::new();
        for segment in &retained {
            let Some(section_id) = segment.mapped_section_id.as_deref() else {
                continue;
            };
            self.fill_section(&mut normalized, section_id, segment);
            provenance
                .entry(section_id.to_string())
                .or_insert_with(|| provenance_entry(segment));
        }

        let inline_warnings = split_inline_parents(&mut normalized);

        let report = build_report(
            self.ruleset,
            &normalized,
            &retained,
            segments,
            &inline_warnings,
            gate_profile_override,
        );

        NormalizationOutput {
            normalized,
            report,
            provenance,
        }
    }

    fn fill_section(&self, doc: &mut NormalizedDocument, section_id: &str, segment: &Segment) {
        if !self.ruleset.contains(section_id) {
            return;
        }
        let content = self.resolve_content(section_id, segment);

        if section_id == IDENTITY_ID {
            fill_identity(doc, &content, &segment.raw_title);
            return;
        }
        set_nested(doc, section_id, SectionValue::Leaf(content));
    }

    fn resolve_content(&self, section_id: &str, segment: &Segment) -> String {
        if self.ruleset.is_never_invent(section_id) && segment.paragraphs.is_empty() {
            return String::new();
        }
        match self.ruleset.fill_strategy(section_id) {
            FillStrategy::Copy | FillStrategy::SourceOnly => segment.body_text(),
            // No summarizer exists; these keep the source text as is.
            FillStrategy::Summarize(name) | FillStrategy::Unrecognized(name) => {
                tracing::debug!(section = section_id, strategy = %name, "fill strategy falls back to copy");
                segment.body_text()
            }
        }
    }
}

/// One retained segment per section id, groups in order of first
/// appearance, followed by every unmapped segment.
///
/// For the identity section a candidate whose raw title carries an AVS
/// number wins; otherwise the highest `(confidence, paragraph count)` is
/// kept, the earliest on ties.
pub fn deduplicate(segments: &[Segment]) -> Vec<Segment> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Segment>> = HashMap::new();
    for segment in segments {
        if let Some(id) = segment.mapped_section_id.as_deref() {
            groups
                .entry(id)
                .or_insert_with(|| {
                    order.push(id);
                    Vec::new()
                })
                .push(segment);
        }
    }

    let mut retained: Vec<Segment> = order
        .iter()
        .filter_map(|id| groups.get(id).and_then(|group| pick_candidate(id, group)))
        .cloned()
        .collect();
    retained.extend(segments.iter().filter(|s| !s.is_mapped()).cloned());
    retained
}

fn pick_candidate<'s>(section_id: &str, group: &[&'s Segment]) -> Option<&'s Segment> {
    if section_id == IDENTITY_ID {
        if let Some(with_avs) = group.iter().find(|s| contains_avs(&s.raw_title)) {
            return Some(*with_avs);
        }
    }
    let mut best: Option<&Segment> = None;
    for candidate in group {
        let better = match best {
            None => true,
            Some(current) => {
                candidate.confidence > current.confidence
                    || (candidate.confidence == current.confidence
                        && candidate.paragraph_count() > current.paragraph_count())
            }
        };
        if better {
            best = Some(*candidate);
        }
    }
    best
}

/// Write extracted identity fields, leaving already-set fields alone.
fn fill_identity(doc: &mut NormalizedDocument, body: &str, raw_title: &str) {
    let mut fields = extract_identity(body);
    fields.fill_gaps(extract_identity(raw_title));
    if fields.is_empty() {
        return;
    }

    let entry = doc
        .root_mut()
        .entry(IDENTITY_ID.to_string())
        .or_insert_with(SectionValue::empty_node);
    let node = ensure_node(entry);
    for (key, value) in fields.entries() {
        if value.is_empty() {
            continue;
        }
        let already_set = node.get(key).is_some_and(SectionValue::has_content);
        if !already_set {
            node.insert(key.to_string(), SectionValue::from(value));
        }
    }
}

fn provenance_entry(segment: &Segment) -> ProvenanceEntry {
    ProvenanceEntry {
        source_title: segment.raw_title.clone(),
        normalized_title: segment.normalized_title.clone(),
        confidence: segment.confidence,
        level: segment.level,
        paragraph_count: segment.paragraph_count(),
        snippet: snippet(&segment.body_text(), SNIPPET_CHARS),
        match_method: segment.match_method,
    }
}

/// Split composite parents that resolved to one block of text. Returns the
/// warnings for parents whose split failed.
fn split_inline_parents(doc: &mut NormalizedDocument) -> Vec<String> {
    let mut warnings = Vec::new();
    for parent in inline::composite_parents() {
        let Some(SectionValue::Leaf(content)) = doc.root().get(parent) else {
            continue;
        };
        if content.trim().is_empty() {
            continue;
        }

        let replacement: BTreeMap<String, SectionValue> = match inline::split_inline(parent, content) {
            Some(parts) => parts
                .into_iter()
                .map(|(key, text)| (key, SectionValue::Leaf(text)))
                .collect(),
            None => {
                let expected = inline::expected_keys(parent);
                let warning = format!(
                    "Inline split failed for {parent} (expected: {})",
                    expected.join(", ")
                );
                tracing::warn!("{warning}");
                warnings.push(warning);
                expected
                    .into_iter()
                    .map(|key| (key.to_string(), SectionValue::default()))
                    .collect()
            }
        };
        doc.root_mut()
            .insert(parent.to_string(), SectionValue::Node(replacement));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchMethod;
    use crate::types::Paragraph;
    use pretty_assertions::assert_eq;

    fn mapped(title: &str, id: &str, confidence: f64, body: &[&str]) -> Segment {
        let mut segment = Segment::new(title, title.to_uppercase(), 1);
        segment.mapped_section_id = Some(id.to_string());
        segment.confidence = confidence;
        segment.match_method = Some(MatchMethod::Exact);
        segment.paragraphs = body.iter().map(|t| Paragraph::new(*t)).collect();
        segment
    }

    #[test]
    fn dedup_keeps_best_candidate_per_id() {
        let segments = vec![
            mapped("Tests", "tests", 0.9, &["a"]),
            Segment::new("Divers", "DIVERS", 1),
            mapped("Tests", "tests", 1.0, &["b"]),
            mapped("Conclusion", "conclusion", 1.0, &["c"]),
            mapped("Tests", "tests", 1.0, &["c", "d"]),
        ];
        let retained = deduplicate(&segments);
        let summary: Vec<(Option<&str>, usize)> = retained
            .iter()
            .map(|s| (s.mapped_section_id.as_deref(), s.paragraph_count()))
            .collect();
        assert_eq!(
            summary,
            vec![(Some("tests"), 2), (Some("conclusion"), 1), (None, 0)]
        );
    }

    #[test]
    fn dedup_ties_keep_the_first() {
        let segments = vec![
            mapped("Vocation", "vocation", 1.0, &["premier"]),
            mapped("Vocation", "vocation", 1.0, &["second"]),
        ];
        let retained = deduplicate(&segments);
        assert_eq!(retained.len(), 1);
        assert_eq!(retained[0].body_text(), "premier");
    }

    #[test]
    fn dropped_duplicate_still_signals_stage() {
        let ruleset = Ruleset::builtin().unwrap();
        let segments = vec![
            mapped("Orientation et formation", "orientation_formation", 1.0, &["Apprentissage"]),
            mapped("Orientation et stage", "orientation_formation", 0.9, &["Deux semaines"]),
        ];
        assert_eq!(deduplicate(&segments).len(), 1);

        let output = Normalizer::new(&ruleset).normalize(&segments, None);
        let gate = &output.report.production_gate;
        assert!(gate.signals.has_stage);
        assert_eq!(gate.profile, "stage");
        assert_eq!(output.report.found_sections.len(), 1);
    }

    #[test]
    fn dropped_duplicate_still_signals_lai() {
        let ruleset = Ruleset::builtin().unwrap();
        let segments = vec![
            mapped("Conclusion", "conclusion", 1.0, &["Mesure à poursuivre."]),
            mapped("Conclusion mesure LAI 18", "conclusion", 0.9, &["Suite"]),
        ];

        let output = Normalizer::new(&ruleset).normalize(&segments, None);
        let signals = &output.report.production_gate.signals;
        assert!(signals.has_lai18);
        assert!(!signals.has_lai15);
        assert_eq!(signals.triggered_family, "lai");
        assert_eq!(output.report.production_gate.profile, "placement_suivi");
    }

    #[test]
    fn identity_prefers_avs_title() {
        let segments = vec![
            mapped("Identité", "identity", 1.0, &["x", "y"]),
            mapped("Monsieur Paul ROTH – 756.1234.5678.90", "identity", 0.85, &[]),
        ];
        let retained = deduplicate(&segments);
        assert_eq!(retained.len(), 1);
        assert!(retained[0].raw_title.starts_with("Monsieur"));
    }

    #[test]
    fn identity_fields_from_title() {
        let ruleset = Ruleset::builtin().unwrap();
        let segments = vec![mapped(
            "Monsieur Jean Paul DUPONT – 756.1234.5678.90",
            "identity",
            0.85,
            &[],
        )];
        let output = Normalizer::new(&ruleset).normalize(&segments, None);
        let doc = &output.normalized;
        assert_eq!(doc.get_str("identity.avs"), Some("756.1234.5678.90"));
        assert_eq!(doc.get_str("identity.surname"), Some("DUPONT"));
        assert_eq!(doc.get_str("identity.name"), Some("Jean Paul"));
        assert_eq!(doc.get_str("identity.full_name"), Some("Jean Paul DUPONT"));
        assert!(!output.report.missing_required_sections.contains(&"identity".to_string()));
    }

    #[test]
    fn never_invent_sections_stay_empty() {
        let ruleset = Ruleset::builtin().unwrap();
        let segments = vec![mapped("Conclusion", "conclusion", 1.0, &[])];
        let output = Normalizer::new(&ruleset).normalize(&segments, None);
        assert_eq!(output.normalized.get_str("conclusion"), Some(""));
        assert_eq!(output.provenance["conclusion"].paragraph_count, 0);
    }

    #[test]
    fn summarize_keeps_source_text() {
        let ruleset = Ruleset::builtin().unwrap();
        let segments = vec![mapped(
            "Incertitudes",
            "incertitudes_obstacles",
            1.0,
            &["Mobilité réduite", "Horaires"],
        )];
        let output = Normalizer::new(&ruleset).normalize(&segments, None);
        assert_eq!(
            output.normalized.get_str("incertitudes_obstacles"),
            Some("Mobilité réduite\nHoraires")
        );
    }

    #[test]
    fn composite_parent_text_is_split() {
        let ruleset = Ruleset::builtin().unwrap();
        let segments = vec![mapped(
            "Profession et formation",
            "profession_formation",
            1.0,
            &["Profession: Menuisier", "Formation: CFC de menuisier"],
        )];
        let output = Normalizer::new(&ruleset).normalize(&segments, None);
        assert_eq!(
            output.normalized.get_str("profession_formation.profession"),
            Some("Menuisier")
        );
        assert_eq!(
            output.normalized.get_str("profession_formation.formation"),
            Some("CFC de menuisier")
        );
    }

    #[test]
    fn failed_split_leaves_empty_keys_and_warns() {
        let ruleset = Ruleset::builtin().unwrap();
        let segments = vec![mapped(
            "Compétences",
            "competences",
            1.0,
            &["Bonne présentation générale"],
        )];
        let output = Normalizer::new(&ruleset).normalize(&segments, None);
        let node = output
            .normalized
            .get_path("competences")
            .and_then(SectionValue::as_node)
            .unwrap();
        assert_eq!(node.len(), 2);
        assert!(!node.values().any(SectionValue::has_content));
        assert!(output
            .report
            .warnings
            .contains(&"Inline split failed for competences (expected: sociales, professionnelles)".to_string()));
    }

    #[test]
    fn custom_template_is_the_starting_point() {
        let ruleset = Ruleset::builtin().unwrap();
        let mut template = NormalizedDocument::new();
        template
            .root_mut()
            .insert("annexes".to_string(), SectionValue::from(""));
        let output = Normalizer::new(&ruleset)
            .with_template(&template)
            .normalize(&[mapped("Vocation", "vocation", 1.0, &["Cuisine"])], None);
        assert_eq!(output.normalized.root().len(), 2);
        assert_eq!(output.normalized.get_str("vocation"), Some("Cuisine"));
    }

    #[test]
    fn provenance_snippet_is_truncated() {
        let ruleset = Ruleset::builtin().unwrap();
        let long = "é".repeat(300);
        let output = Normalizer::new(&ruleset)
            .normalize(&[mapped("Vocation", "vocation", 1.0, &[long.as_str()])], None);
        let entry = &output.provenance["vocation"];
        assert_eq!(entry.snippet.chars().count(), SNIPPET_CHARS);
        assert_eq!(entry.source_title, "Vocation");
        assert_eq!(entry.match_method, Some(MatchMethod::Exact));
    }
}
