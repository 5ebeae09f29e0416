use crate::ruleset::Ruleset;
use crate::types::{FoundSection, GateSignals, Segment};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const STAGE_PROFILE: &str = "stage";
pub const BILAN_COMPLET_PROFILE: &str = "bilan_complet";
pub const PLACEMENT_SUIVI_PROFILE: &str = "placement_suivi";

/// Sections whose presence marks a full assessment report.
pub const BILAN_COMPLET_SECTIONS: [&str; 4] =
    ["tests", "vocation", "profil_emploi", "ressources_professionnelles"];

/// Distinct bilan sections needed to select `bilan_complet`.
const BILAN_COMPLET_MIN_SECTIONS: usize = 2;

static STAGE_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstages?\b").expect("static stage regex"));

static LAI_MEASURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bLAI\s*[-.]?\s*(15|18)\b").expect("static LAI regex")
});

/// Chosen gate profile and the evidence behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSelection {
    pub profile: String,
    pub signals: GateSignals,
}

/// Picks the production-gate profile from the document's structure.
///
/// Signal families are checked in a fixed order: a stage keyword selects
/// `stage`, then two or more bilan sections select `bilan_complet`, then an
/// LAI 15/18 mention selects `placement_suivi`; otherwise the ruleset's
/// default profile applies. Scores and ranking are diagnostics only.
pub struct ProfileClassifier<'a> {
    ruleset: &'a Ruleset,
}

impl<'a> ProfileClassifier<'a> {
    pub fn new(ruleset: &'a Ruleset) -> Self {
        Self { ruleset }
    }

    pub fn classify(
        &self,
        segments: &[Segment],
        found_sections: &[FoundSection],
        override_profile: Option<&str>,
    ) -> ProfileSelection {
        let mut signals = GateSignals::default();

        let mut stage_hits = 0usize;
        let mut lai_hits = 0usize;
        for segment in segments {
            let title = &segment.normalized_title;
            if STAGE_KEYWORD.is_match(title) {
                stage_hits += 1;
            }
            for caps in LAI_MEASURE.captures_iter(title) {
                lai_hits += 1;
                match caps.get(1).map(|m| m.as_str()) {
                    Some("15") => signals.has_lai15 = true,
                    Some("18") => signals.has_lai18 = true,
                    _ => {}
                }
            }
        }
        signals.has_stage = stage_hits > 0;

        signals.bilan_complet_sections = BILAN_COMPLET_SECTIONS
            .iter()
            .filter(|family_id| {
                found_sections
                    .iter()
                    .any(|found| root_id(&found.id) == **family_id)
            })
            .map(|id| id.to_string())
            .collect();
        signals.bilan_complet_sections_count = signals.bilan_complet_sections.len();

        let default_profile = self.ruleset.default_profile();
        signals.scores = score_profiles(
            stage_hits,
            signals.bilan_complet_sections_count,
            lai_hits,
            default_profile,
        );
        signals.ranking = rank(&signals.scores);
        signals.selection_confidence = selection_confidence(&signals.ranking, &signals.scores);

        let (profile, family) = if let Some(forced) = override_profile {
            signals.forced = true;
            (forced.to_string(), "forced")
        } else if signals.has_stage {
            (STAGE_PROFILE.to_string(), "stage")
        } else if signals.bilan_complet_sections_count >= BILAN_COMPLET_MIN_SECTIONS {
            (BILAN_COMPLET_PROFILE.to_string(), "bilan_complet")
        } else if signals.has_lai15 || signals.has_lai18 {
            (PLACEMENT_SUIVI_PROFILE.to_string(), "lai")
        } else {
            (default_profile.to_string(), "default")
        };
        signals.triggered_family = family.to_string();

        tracing::debug!(profile = %profile, family, "gate profile selected");
        ProfileSelection { profile, signals }
    }
}

fn root_id(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}

fn score_profiles(
    stage_hits: usize,
    bilan_sections: usize,
    lai_hits: usize,
    default_profile: &str,
) -> BTreeMap<String, f64> {
    let mut scores = BTreeMap::new();
    scores.insert(STAGE_PROFILE.to_string(), 2.0 * stage_hits as f64);
    scores.insert(BILAN_COMPLET_PROFILE.to_string(), bilan_sections as f64);
    scores.insert(PLACEMENT_SUIVI_PROFILE.to_string(), 1.5 * lai_hits as f64);
    *scores.entry(default_profile.to_string()).or_insert(0.0) += 0.5;
    scores
}

/// Profile ids by descending score, ties broken by id.
fn rank(scores: &BTreeMap<String, f64>) -> Vec<String> {
    let mut ranked: Vec<(&String, f64)> = scores.iter().map(|(id, s)| (id, *s)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().map(|(id, _)| id.clone()).collect()
}

fn selection_confidence(ranking: &[String], scores: &BTreeMap<String, f64>) -> f64 {
    let score_at = |idx: usize| {
        ranking
            .get(idx)
            .and_then(|id| scores.get(id))
            .copied()
            .unwrap_or(0.0)
    };
    score_at(0) - score_at(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(title: &str) -> Segment {
        Segment::new(title, title.to_uppercase(), 1)
    }

    fn found(id: &str) -> FoundSection {
        FoundSection {
            id: id.to_string(),
            title: id.to_uppercase(),
            confidence: 1.0,
            method: None,
        }
    }

    fn classify(titles: &[&str], found_ids: &[&str], forced: Option<&str>) -> ProfileSelection {
        let ruleset = Ruleset::builtin().unwrap();
        let segments: Vec<Segment> = titles.iter().map(|t| segment(t)).collect();
        let found: Vec<FoundSection> = found_ids.iter().map(|id| found(id)).collect();
        ProfileClassifier::new(&ruleset).classify(&segments, &found, forced)
    }

    #[test]
    fn stage_keyword_wins_over_bilan_sections() {
        let selection = classify(
            &["Stage pratique", "Tests", "Vocation", "Profil emploi"],
            &["tests", "vocation", "profil_emploi"],
            None,
        );
        assert_eq!(selection.profile, "stage");
        assert!(selection.signals.has_stage);
        assert_eq!(selection.signals.bilan_complet_sections_count, 3);
        assert_eq!(selection.signals.triggered_family, "stage");
    }

    #[test]
    fn stage_variants() {
        for title in ["Bilan de stage", "Orientation formation stage", "Stage de suivi"] {
            assert_eq!(classify(&[title], &[], None).profile, "stage", "{title}");
        }
        assert_ne!(classify(&["Stagiaire"], &[], None).profile, "stage");
    }

    #[test]
    fn two_bilan_sections_select_bilan_complet() {
        let selection = classify(&["Tests", "Profil emploi"], &["tests", "profil_emploi"], None);
        assert_eq!(selection.profile, "bilan_complet");
        assert_eq!(
            selection.signals.bilan_complet_sections,
            vec!["tests".to_string(), "profil_emploi".to_string()]
        );
    }

    #[test]
    fn one_bilan_section_is_not_enough() {
        let selection = classify(&["Tests"], &["tests"], None);
        assert_eq!(selection.profile, "placement_suivi");
        assert_eq!(selection.signals.triggered_family, "default");
    }

    #[test]
    fn lai_mentions_select_placement() {
        let selection = classify(&["Mesures LAI 15"], &[], None);
        assert_eq!(selection.profile, "placement_suivi");
        assert!(selection.signals.has_lai15);
        assert!(!selection.signals.has_lai18);
        assert_eq!(selection.signals.triggered_family, "lai");

        assert!(classify(&["Mesure LAI-18"], &[], None).signals.has_lai18);
    }

    #[test]
    fn override_is_forced() {
        let selection = classify(&["Stage pratique"], &[], Some("bilan_complet"));
        assert_eq!(selection.profile, "bilan_complet");
        assert!(selection.signals.forced);
        assert!(selection.signals.has_stage);
    }

    #[test]
    fn scores_rank_and_confidence() {
        let selection = classify(&["Stage", "Stage"], &["tests"], None);
        let signals = &selection.signals;
        assert_eq!(signals.scores["stage"], 4.0);
        assert_eq!(signals.scores["placement_suivi"], 0.5);
        assert_eq!(signals.ranking[0], "stage");
        assert_eq!(signals.selection_confidence, 3.0);
    }
}
