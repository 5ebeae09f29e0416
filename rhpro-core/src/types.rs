use crate::config::MatchMethod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Version of the `ParseResult` JSON layout.
pub const SCHEMA_VERSION: &str = "1.0.0";

// ===== INPUT TYPES =====

/// One extracted paragraph, as produced by the upstream document reader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    #[serde(default)]
    pub style_name: Option<String>,
    #[serde(default)]
    pub is_bold: bool,
    /// Average font size in points
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub is_all_caps: bool,
    /// Dotted list numbering such as "2.1", when the paragraph is numbered
    #[serde(default)]
    pub numbering_prefix: Option<String>,
}

impl Paragraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    pub fn with_style(mut self, style_name: impl Into<String>) -> Self {
        self.style_name = Some(style_name.into());
        self
    }

    pub fn with_numbering(mut self, prefix: impl Into<String>) -> Self {
        self.numbering_prefix = Some(prefix.into());
        self
    }
}

// ===== PIPELINE TYPES =====

/// A detected heading plus the body paragraphs that follow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub raw_title: String,
    pub normalized_title: String,
    pub level: u32,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
    #[serde(default)]
    pub mapped_section_id: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub match_method: Option<MatchMethod>,
}

impl Segment {
    pub fn new(raw_title: impl Into<String>, normalized_title: impl Into<String>, level: u32) -> Self {
        Self {
            raw_title: raw_title.into(),
            normalized_title: normalized_title.into(),
            level,
            paragraphs: Vec::new(),
            mapped_section_id: None,
            confidence: 0.0,
            match_method: None,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped_section_id.is_some()
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    /// Body paragraphs joined with newlines, verbatim.
    pub fn body_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear_mapping(&mut self) {
        self.mapped_section_id = None;
        self.confidence = 0.0;
        self.match_method = None;
    }
}

// ===== NORMALIZED OUTPUT =====

/// A value in the normalized document: either text or a keyed sub-tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionValue {
    Leaf(String),
    Node(BTreeMap<String, SectionValue>),
}

impl Default for SectionValue {
    fn default() -> Self {
        SectionValue::Leaf(String::new())
    }
}

impl SectionValue {
    pub fn empty_node() -> Self {
        SectionValue::Node(BTreeMap::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SectionValue::Leaf(text) => Some(text),
            SectionValue::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&BTreeMap<String, SectionValue>> {
        match self {
            SectionValue::Leaf(_) => None,
            SectionValue::Node(map) => Some(map),
        }
    }

    pub fn get(&self, key: &str) -> Option<&SectionValue> {
        self.as_node().and_then(|map| map.get(key))
    }

    /// True when at least one leaf below (or at) this value is non-blank.
    pub fn has_content(&self) -> bool {
        match self {
            SectionValue::Leaf(text) => !text.trim().is_empty(),
            SectionValue::Node(map) => map.values().any(SectionValue::has_content),
        }
    }
}

impl From<&str> for SectionValue {
    fn from(value: &str) -> Self {
        SectionValue::Leaf(value.to_string())
    }
}

impl From<String> for SectionValue {
    fn from(value: String) -> Self {
        SectionValue::Leaf(value)
    }
}

/// Nested document keyed by the ruleset's dotted section ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedDocument(pub BTreeMap<String, SectionValue>);

impl NormalizedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &BTreeMap<String, SectionValue> {
        &self.0
    }

    pub fn root_mut(&mut self) -> &mut BTreeMap<String, SectionValue> {
        &mut self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a dotted path such as `orientation_formation.stage`.
    pub fn get_path(&self, path: &str) -> Option<&SectionValue> {
        let mut keys = path.split('.');
        let mut current = self.0.get(keys.next()?)?;
        for key in keys {
            current = current.get(key)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_path(path).and_then(SectionValue::as_str)
    }
}

// ===== REPORT TYPES =====

/// Audit record explaining where a section's value came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub source_title: String,
    pub normalized_title: String,
    pub confidence: f64,
    pub level: u32,
    pub paragraph_count: usize,
    pub snippet: String,
    #[serde(default)]
    pub match_method: Option<MatchMethod>,
}

pub type ProvenanceMap = BTreeMap<String, ProvenanceEntry>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundSection {
    pub id: String,
    pub title: String,
    pub confidence: f64,
    #[serde(default)]
    pub method: Option<MatchMethod>,
}

/// A leftover template marker found in the normalized output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub path: String,
    pub pattern: String,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub found_sections: Vec<FoundSection>,
    pub missing_required_sections: Vec<String>,
    pub unknown_titles: Vec<String>,
    pub coverage_ratio: f64,
    /// Filled required sections over required sections; 0.0 when the
    /// ruleset declares none.
    pub required_coverage_ratio: f64,
    pub weighted_coverage: f64,
    pub warnings: Vec<String>,
    pub placeholders: Vec<Placeholder>,
    pub production_gate: ProductionGateDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "NO-GO")]
    NoGo,
}

impl GateStatus {
    pub fn is_go(&self) -> bool {
        matches!(self, GateStatus::Go)
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateStatus::Go => f.write_str("GO"),
            GateStatus::NoGo => f.write_str("NO-GO"),
        }
    }
}

/// Structural signals gathered while choosing a gate profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateSignals {
    pub has_stage: bool,
    pub has_lai15: bool,
    pub has_lai18: bool,
    pub bilan_complet_sections: Vec<String>,
    pub bilan_complet_sections_count: usize,
    /// Which signal family decided the profile ("stage", "bilan_complet",
    /// "lai", "default" or "forced")
    pub triggered_family: String,
    pub scores: BTreeMap<String, f64>,
    pub ranking: Vec<String>,
    pub selection_confidence: f64,
    pub forced: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCriteria {
    pub missing_required_ok: bool,
    pub required_coverage_ok: bool,
    pub unknown_titles_ok: bool,
    pub placeholders_ok: bool,
}

impl GateCriteria {
    pub fn all_ok(&self) -> bool {
        self.missing_required_ok
            && self.required_coverage_ok
            && self.unknown_titles_ok
            && self.placeholders_ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateMetrics {
    pub required_coverage_ratio: f64,
    pub required_coverage_ratio_effective: f64,
    pub missing_required_sections_count: usize,
    pub missing_required_sections_count_effective: usize,
    pub required_sections_count_effective: usize,
    pub unknown_titles_count: usize,
    pub placeholders_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionGateDecision {
    pub status: GateStatus,
    pub profile: String,
    pub signals: GateSignals,
    pub criteria: GateCriteria,
    pub metrics: GateMetrics,
    pub missing_required_effective: Vec<String>,
    pub reasons: Vec<String>,
}

/// Identifies the ruleset a result was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetInfo {
    pub version: String,
    pub language: String,
    pub doc_type: String,
    pub fingerprint: String,
}

/// Everything a single parse call returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub schema_version: String,
    pub ruleset: RulesetInfo,
    pub normalized: NormalizedDocument,
    pub report: CoverageReport,
    pub provenance: ProvenanceMap,
}

impl ParseResult {
    pub fn status(&self) -> GateStatus {
        self.report.production_gate.status
    }

    pub fn provenance_for(&self, section_id: &str) -> Option<&ProvenanceEntry> {
        self.provenance.get(section_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_value_serializes_untagged() {
        let mut inner = BTreeMap::new();
        inner.insert("profession".to_string(), SectionValue::from("Menuisier"));
        inner.insert("formation".to_string(), SectionValue::default());
        let mut doc = NormalizedDocument::new();
        doc.root_mut()
            .insert("profession_formation".to_string(), SectionValue::Node(inner));

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(
            json,
            r#"{"profession_formation":{"formation":"","profession":"Menuisier"}}"#
        );

        let back: NormalizedDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get_str("profession_formation.profession"), Some("Menuisier"));
    }

    #[test]
    fn has_content_looks_through_nodes() {
        let mut inner = BTreeMap::new();
        inner.insert("a".to_string(), SectionValue::from("  "));
        assert!(!SectionValue::Node(inner.clone()).has_content());
        inner.insert("b".to_string(), SectionValue::from("x"));
        assert!(SectionValue::Node(inner).has_content());
    }

    #[test]
    fn gate_status_wire_names() {
        assert_eq!(serde_json::to_string(&GateStatus::NoGo).unwrap(), r#""NO-GO""#);
        assert_eq!(GateStatus::Go.to_string(), "GO");
    }

    #[test]
    fn paragraph_defaults_from_minimal_json() {
        let p: Paragraph = serde_json::from_str(r#"{"text": "Conclusion"}"#).unwrap();
        assert_eq!(p, Paragraph::new("Conclusion"));
    }
}
