use crate::error::{RulesetError, RulesetResult};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_max_length() -> usize {
    90
}

fn default_fuzzy_threshold() -> f64 {
    0.84
}

fn default_method_order() -> Vec<MatchMethod> {
    vec![
        MatchMethod::Exact,
        MatchMethod::Contains,
        MatchMethod::Regex,
        MatchMethod::Fuzzy,
    ]
}

fn default_detector_order() -> Vec<DetectorKind> {
    vec![
        DetectorKind::ByStyle,
        DetectorKind::ByRegex,
        DetectorKind::ByHeuristics,
    ]
}

fn default_profile_id() -> String {
    "placement_suivi".to_string()
}

/// Ruleset file as written on disk (YAML or JSON).
///
/// The four identifying keys are optional here so that a missing key can be
/// reported as a `RulesetError::MissingKey` instead of a bare serde message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetConfig {
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub version: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub heading_detection: HeadingDetectionConfig,
    #[serde(default)]
    pub title_matching: TitleMatchingConfig,
    #[serde(default)]
    pub content_rules: ContentRules,
    #[serde(default)]
    pub production_gate: ProductionGateConfig,
    #[serde(default)]
    pub sections: Option<Vec<SectionConfig>>,
}

/// Title transforms applied by the segmenter, always in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    #[serde(default)]
    pub trim: bool,
    #[serde(default)]
    pub collapse_whitespace: bool,
    #[serde(default)]
    pub strip_trailing_colon: bool,
    #[serde(default)]
    pub uppercase: bool,
    #[serde(default)]
    pub remove_nbsp: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    ByStyle,
    ByRegex,
    ByHeuristics,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectorKind::ByStyle => "by_style",
            DetectorKind::ByRegex => "by_regex",
            DetectorKind::ByHeuristics => "by_heuristics",
        };
        f.write_str(name)
    }
}

/// Heading detectors. A block that is absent from the file stays disabled;
/// a block that is present is enabled unless it says `enabled: false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingDetectionConfig {
    #[serde(default = "default_detector_order")]
    pub order: Vec<DetectorKind>,
    #[serde(default)]
    pub by_style: Option<StyleDetectionConfig>,
    #[serde(default)]
    pub by_regex: Option<RegexDetectionConfig>,
    #[serde(default)]
    pub by_heuristics: Option<HeuristicDetectionConfig>,
}

impl Default for HeadingDetectionConfig {
    fn default() -> Self {
        Self {
            order: default_detector_order(),
            by_style: None,
            by_regex: None,
            by_heuristics: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleDetectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub styles: Vec<StyleLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleLevel {
    pub name: String,
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexDetectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub patterns: Vec<RegexPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexPattern {
    pub regex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicDetectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum title length in characters
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Only accept bold paragraphs as heuristic headings
    #[serde(default = "default_true")]
    pub prefer_bold: bool,
}

impl Default for HeuristicDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: default_max_length(),
            prefer_bold: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Contains,
    Regex,
    Fuzzy,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::Contains => "contains",
            MatchMethod::Regex => "regex",
            MatchMethod::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleMatchingConfig {
    #[serde(default = "default_method_order")]
    pub method_order: Vec<MatchMethod>,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for TitleMatchingConfig {
    fn default() -> Self {
        Self {
            method_order: default_method_order(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentRules {
    /// Sections that must stay blank rather than receive synthesized text
    #[serde(default)]
    pub never_invent_for: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionGateConfig {
    #[serde(default = "default_profile_id")]
    pub default_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, GateProfile>,
}

impl Default for ProductionGateConfig {
    fn default() -> Self {
        Self {
            default_profile: default_profile_id(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateProfile {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thresholds: GateThresholds,
    #[serde(default)]
    pub ignore_required_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    pub max_missing_required: usize,
    pub min_required_coverage_ratio: f64,
    pub max_unknown_titles: usize,
    pub max_placeholders: usize,
}

impl Default for GateThresholds {
    /// Placement/follow-up thresholds, used when a ruleset defines no profiles.
    fn default() -> Self {
        Self {
            max_missing_required: 2,
            min_required_coverage_ratio: 0.85,
            max_unknown_titles: 10,
            max_placeholders: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub weighted: bool,
    #[serde(default)]
    pub fill_strategy: FillStrategy,
    #[serde(default)]
    pub anchors: AnchorsConfig,
    #[serde(default)]
    pub children: Vec<SectionConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorsConfig {
    #[serde(default)]
    pub any: Vec<AnchorEntry>,
}

/// One `anchors.any` item. An item may carry several keys at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

/// How a mapped segment's body becomes the stored section value.
///
/// `summarize*` strategies are accepted but not implemented: they resolve
/// exactly like `copy`. Unrecognized names do the same.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FillStrategy {
    #[default]
    Copy,
    SourceOnly,
    Summarize(String),
    Unrecognized(String),
}

impl FillStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            FillStrategy::Copy => "copy",
            FillStrategy::SourceOnly => "source_only",
            FillStrategy::Summarize(name) | FillStrategy::Unrecognized(name) => name,
        }
    }
}

impl From<&str> for FillStrategy {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "copy" => FillStrategy::Copy,
            "source_only" => FillStrategy::SourceOnly,
            other if other.starts_with("summarize") => FillStrategy::Summarize(other.to_string()),
            other => FillStrategy::Unrecognized(other.to_string()),
        }
    }
}

impl Serialize for FillStrategy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FillStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(FillStrategy::from).unwrap_or_default())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// Accept `version: 1`, `version: 1.2` and `version: "1.2.0"` alike.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value.map(|scalar| match scalar {
        Scalar::Text(text) => text,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(f) => format!("{f:?}"),
    }))
}

impl RulesetConfig {
    /// Load a ruleset from disk. Files ending in `.json` are read as JSON,
    /// everything else as YAML.
    pub fn load_from_file(path: impl AsRef<Path>) -> RulesetResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RulesetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn from_yaml_str(content: &str) -> RulesetResult<Self> {
        let config: RulesetConfig = serde_yaml::from_str(content)?;
        config.check_required_keys()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> RulesetResult<Self> {
        let config: RulesetConfig = serde_json::from_str(content)?;
        config.check_required_keys()?;
        Ok(config)
    }

    fn check_required_keys(&self) -> RulesetResult<()> {
        if self.version.is_none() {
            return Err(RulesetError::MissingKey("version"));
        }
        if self.language.is_none() {
            return Err(RulesetError::MissingKey("language"));
        }
        if self.doc_type.is_none() {
            return Err(RulesetError::MissingKey("doc_type"));
        }
        if self.sections.is_none() {
            return Err(RulesetError::MissingKey("sections"));
        }
        Ok(())
    }

    /// SHA-256 over the canonical JSON form, reported alongside every result
    /// so outputs can be traced back to the exact ruleset that produced them.
    pub fn fingerprint(&self) -> RulesetResult<String> {
        let config_json = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(config_json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version: 1
language: fr
doc_type: bilan
sections:
  - id: conclusion
    anchors:
      any:
        - exact: Conclusion
"#;

    #[test]
    fn numeric_version_is_accepted() {
        let config = RulesetConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.version.as_deref(), Some("1"));
    }

    #[test]
    fn missing_doc_type_is_fatal() {
        let yaml = "version: '1.0'\nlanguage: fr\nsections: []\n";
        let err = RulesetConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, RulesetError::MissingKey("doc_type")));
    }

    #[test]
    fn missing_sections_is_fatal() {
        let yaml = "version: '1.0'\nlanguage: fr\ndoc_type: bilan\n";
        let err = RulesetConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, RulesetError::MissingKey("sections")));
    }

    #[test]
    fn unknown_match_method_is_rejected() {
        let yaml = format!("{MINIMAL}title_matching:\n  method_order: [exact, phonetic]\n");
        assert!(matches!(
            RulesetConfig::from_yaml_str(&yaml),
            Err(RulesetError::Yaml(_))
        ));
    }

    #[test]
    fn defaults_follow_documented_values() {
        let config = RulesetConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.title_matching.method_order, default_method_order());
        assert_eq!(config.title_matching.fuzzy_threshold, 0.84);
        assert_eq!(config.production_gate.default_profile, "placement_suivi");
        assert!(config.heading_detection.by_style.is_none());
        let section = &config.sections.as_ref().unwrap()[0];
        assert_eq!(section.fill_strategy, FillStrategy::Copy);
    }

    #[test]
    fn fill_strategy_names() {
        assert_eq!(FillStrategy::from("source_only"), FillStrategy::SourceOnly);
        assert_eq!(
            FillStrategy::from("summarize_short"),
            FillStrategy::Summarize("summarize_short".to_string())
        );
        assert_eq!(
            FillStrategy::from("paraphrase"),
            FillStrategy::Unrecognized("paraphrase".to_string())
        );
    }

    #[test]
    fn heuristics_block_defaults() {
        let yaml = format!("{MINIMAL}heading_detection:\n  by_heuristics: {{}}\n");
        let config = RulesetConfig::from_yaml_str(&yaml).unwrap();
        let heuristics = config.heading_detection.by_heuristics.unwrap();
        assert!(heuristics.enabled);
        assert_eq!(heuristics.max_length, 90);
        assert!(heuristics.prefer_bold);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = RulesetConfig::from_yaml_str(MINIMAL).unwrap();
        let b = RulesetConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        let changed = MINIMAL.replace("Conclusion", "Synthese");
        let c = RulesetConfig::from_yaml_str(&changed).unwrap();
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn json_rulesets_load() {
        let json = r#"{"version": "2", "language": "fr", "doc_type": "bilan", "sections": []}"#;
        let config = RulesetConfig::from_json_str(json).unwrap();
        assert_eq!(config.version.as_deref(), Some("2"));
        assert!(config.sections.unwrap().is_empty());
    }
}
