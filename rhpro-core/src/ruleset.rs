use crate::config::{
    FillStrategy, GateProfile, HeadingDetectionConfig, NormalizeConfig, RulesetConfig,
    SectionConfig, TitleMatchingConfig,
};
use crate::error::{RulesetError, RulesetResult};
use crate::text::fold_title;
use crate::types::RulesetInfo;
use regex::{Regex, RegexBuilder};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_RULESET: &str = include_str!("../rulesets/rhpro_v1.yaml");

/// A compiled title anchor.
#[derive(Debug, Clone)]
pub enum AnchorMatcher {
    /// Matches when the folded title equals `folded`
    Exact { text: String, folded: String },
    /// Matches when the lowercased title contains `lowered`
    Contains { text: String, lowered: String },
    /// Case-insensitive search against the raw title
    Regex { regex: Regex },
}

impl AnchorMatcher {
    /// Anchor text usable for fuzzy comparison (exact and contains only).
    pub fn fuzzy_text(&self) -> Option<&str> {
        match self {
            AnchorMatcher::Exact { text, .. } | AnchorMatcher::Contains { text, .. } => Some(text),
            AnchorMatcher::Regex { .. } => None,
        }
    }
}

/// One section of the flattened tree.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub id: String,
    pub label: Option<String>,
    pub required: bool,
    pub weighted: bool,
    pub fill_strategy: FillStrategy,
    pub anchors: Vec<AnchorMatcher>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl SectionSpec {
    /// Last component of the dotted id, the key used inside the parent node.
    pub fn key(&self) -> &str {
        self.id.rsplit('.').next().unwrap_or(&self.id)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Validated, immutable ruleset. The section tree is flattened once, in
/// pre-order, so every lookup afterwards is an index into `sections`.
#[derive(Debug, Clone)]
pub struct Ruleset {
    config: RulesetConfig,
    sections: Vec<SectionSpec>,
    index: HashMap<String, usize>,
    heading_patterns: Vec<Regex>,
    never_invent: HashSet<String>,
    info: RulesetInfo,
}

impl Ruleset {
    pub fn load(path: impl AsRef<Path>) -> RulesetResult<Self> {
        Self::from_config(RulesetConfig::load_from_file(path)?)
    }

    pub fn from_yaml_str(content: &str) -> RulesetResult<Self> {
        Self::from_config(RulesetConfig::from_yaml_str(content)?)
    }

    pub fn from_json_str(content: &str) -> RulesetResult<Self> {
        Self::from_config(RulesetConfig::from_json_str(content)?)
    }

    /// The RH-Pro v1 ruleset shipped with the crate.
    pub fn builtin() -> RulesetResult<Self> {
        Self::from_yaml_str(BUILTIN_RULESET)
    }

    pub fn from_config(config: RulesetConfig) -> RulesetResult<Self> {
        let threshold = config.title_matching.fuzzy_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(RulesetError::InvalidFuzzyThreshold(threshold));
        }

        let gate = &config.production_gate;
        if !gate.profiles.is_empty() && !gate.profiles.contains_key(&gate.default_profile) {
            return Err(RulesetError::UnknownDefaultProfile(gate.default_profile.clone()));
        }

        let mut sections = Vec::new();
        let mut index = HashMap::new();
        let roots = config
            .sections
            .as_deref()
            .ok_or(RulesetError::MissingKey("sections"))?;
        for section in roots {
            flatten_section(section, None, &mut sections, &mut index)?;
        }

        let heading_patterns = compile_heading_patterns(&config.heading_detection)?;
        let never_invent = config.content_rules.never_invent_for.iter().cloned().collect();

        let info = RulesetInfo {
            version: config.version.clone().unwrap_or_default(),
            language: config.language.clone().unwrap_or_default(),
            doc_type: config.doc_type.clone().unwrap_or_default(),
            fingerprint: config.fingerprint()?,
        };

        tracing::debug!(
            sections = sections.len(),
            version = %info.version,
            "ruleset loaded"
        );

        Ok(Self {
            config,
            sections,
            index,
            heading_patterns,
            never_invent,
            info,
        })
    }

    pub fn config(&self) -> &RulesetConfig {
        &self.config
    }

    pub fn info(&self) -> &RulesetInfo {
        &self.info
    }

    pub fn fingerprint(&self) -> &str {
        &self.info.fingerprint
    }

    pub fn normalize_config(&self) -> &NormalizeConfig {
        &self.config.normalize
    }

    pub fn heading_detection(&self) -> &HeadingDetectionConfig {
        &self.config.heading_detection
    }

    /// `by_regex` patterns, anchored at the start of the paragraph.
    pub fn heading_patterns(&self) -> &[Regex] {
        &self.heading_patterns
    }

    pub fn title_matching(&self) -> &TitleMatchingConfig {
        &self.config.title_matching
    }

    /// All sections in pre-order (parents before their children).
    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }

    pub fn section(&self, id: &str) -> Option<&SectionSpec> {
        self.index.get(id).map(|&idx| &self.sections[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn roots(&self) -> impl Iterator<Item = &SectionSpec> {
        self.sections.iter().filter(|s| s.parent.is_none())
    }

    pub fn children_of<'a>(&'a self, section: &'a SectionSpec) -> impl Iterator<Item = &'a SectionSpec> {
        section.children.iter().map(move |&idx| &self.sections[idx])
    }

    pub fn all_ids(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.id.as_str())
    }

    pub fn required_ids(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.required)
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn weighted_ids(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.weighted)
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn is_never_invent(&self, id: &str) -> bool {
        self.never_invent.contains(id)
    }

    pub fn fill_strategy(&self, id: &str) -> FillStrategy {
        self.section(id)
            .map(|s| s.fill_strategy.clone())
            .unwrap_or_default()
    }

    pub fn profile(&self, id: &str) -> Option<&GateProfile> {
        self.config.production_gate.profiles.get(id)
    }

    pub fn profile_ids(&self) -> impl Iterator<Item = &str> {
        self.config.production_gate.profiles.keys().map(String::as_str)
    }

    pub fn default_profile(&self) -> &str {
        &self.config.production_gate.default_profile
    }
}

fn flatten_section(
    section: &SectionConfig,
    parent: Option<usize>,
    sections: &mut Vec<SectionSpec>,
    index: &mut HashMap<String, usize>,
) -> RulesetResult<usize> {
    let id = section.id.trim().to_string();
    if id.is_empty() {
        return Err(RulesetError::EmptySectionId {
            label: section.label.clone().unwrap_or_default(),
        });
    }
    if index.contains_key(&id) {
        return Err(RulesetError::DuplicateSectionId(id));
    }
    if let Some(parent_idx) = parent {
        let parent_id: &str = &sections[parent_idx].id;
        let extends_parent = id
            .strip_prefix(parent_id)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|key| !key.is_empty() && !key.contains('.'));
        if !extends_parent {
            return Err(RulesetError::ChildIdOutsideParent {
                parent: parent_id.to_string(),
                child: id,
            });
        }
    }

    let anchors = compile_anchors(section, &id)?;
    let position = sections.len();
    sections.push(SectionSpec {
        id: id.clone(),
        label: section.label.clone(),
        required: section.required,
        weighted: section.weighted,
        fill_strategy: section.fill_strategy.clone(),
        anchors,
        parent,
        children: Vec::new(),
    });
    index.insert(id, position);

    for child in &section.children {
        let child_idx = flatten_section(child, Some(position), sections, index)?;
        sections[position].children.push(child_idx);
    }

    Ok(position)
}

fn compile_anchors(section: &SectionConfig, id: &str) -> RulesetResult<Vec<AnchorMatcher>> {
    let mut anchors = Vec::new();
    for entry in &section.anchors.any {
        if let Some(text) = &entry.exact {
            anchors.push(AnchorMatcher::Exact {
                folded: fold_title(text),
                text: text.clone(),
            });
        }
        if let Some(text) = &entry.contains {
            anchors.push(AnchorMatcher::Contains {
                lowered: text.to_lowercase(),
                text: text.clone(),
            });
        }
        if let Some(pattern) = &entry.regex {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| RulesetError::InvalidRegex {
                    context: format!("anchor of section `{id}`"),
                    pattern: pattern.clone(),
                    source,
                })?;
            anchors.push(AnchorMatcher::Regex { regex });
        }
    }
    Ok(anchors)
}

fn compile_heading_patterns(config: &HeadingDetectionConfig) -> RulesetResult<Vec<Regex>> {
    let Some(by_regex) = &config.by_regex else {
        return Ok(Vec::new());
    };
    by_regex
        .patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{})", pattern.regex)).map_err(|source| {
                RulesetError::InvalidRegex {
                    context: "heading_detection.by_regex".to_string(),
                    pattern: pattern.regex.clone(),
                    source,
                }
            })
        })
        .collect()
}
