use crate::config::MatchMethod;
use crate::ruleset::{AnchorMatcher, Ruleset};
use crate::text::fold_title;
use crate::types::Segment;
use rapidfuzz::distance::indel;
use regex::Regex;
use std::sync::LazyLock;

const EXACT_CONFIDENCE: f64 = 1.0;
const CONTAINS_CONFIDENCE: f64 = 0.9;
const REGEX_CONFIDENCE: f64 = 0.85;

/// Generic document titles. A cover title such as "Bilan d'orientation
/// professionnelle" must never be mistaken for the orientation section.
static IGNORED_TITLES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^BILAN\s+D['’]ORIENTATION",
        r"(?i)^RAPPORT\s+D['’]ORIENTATION",
        r"(?i)^DOCUMENT\s+D['’]ORIENTATION",
        r"(?i)^BILAN\s+PROFESSIONNEL",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static ignore-list regex"))
    .collect()
});

pub fn is_ignored_title(title: &str) -> bool {
    IGNORED_TITLES.iter().any(|re| re.is_match(title.trim()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TitleMatch {
    pub section_id: String,
    pub confidence: f64,
    pub method: MatchMethod,
}

/// Assigns canonical section ids to segment titles.
pub struct TitleMapper<'a> {
    ruleset: &'a Ruleset,
}

impl<'a> TitleMapper<'a> {
    pub fn new(ruleset: &'a Ruleset) -> Self {
        Self { ruleset }
    }

    pub fn map_segments(&self, segments: &mut [Segment]) {
        let mut mapped = 0usize;
        for segment in segments.iter_mut() {
            if is_ignored_title(&segment.normalized_title) {
                segment.clear_mapping();
                tracing::debug!(title = %segment.normalized_title, "generic document title ignored");
                continue;
            }

            match self.find_match(segment) {
                Some(found) => {
                    segment.mapped_section_id = Some(found.section_id);
                    segment.confidence = found.confidence;
                    segment.match_method = Some(found.method);
                    mapped += 1;
                }
                None => segment.clear_mapping(),
            }
        }
        tracing::debug!(segments = segments.len(), mapped, "title mapping done");
    }

    /// Runs the configured method cascade. The first method with any hit
    /// wins; within a method, only fuzzy looks for the best anchor.
    pub fn find_match(&self, segment: &Segment) -> Option<TitleMatch> {
        self.ruleset
            .title_matching()
            .method_order
            .iter()
            .find_map(|method| match method {
                MatchMethod::Exact => self.match_exact(&segment.normalized_title),
                MatchMethod::Contains => self.match_contains(&segment.normalized_title),
                MatchMethod::Regex => self.match_regex(segment.raw_title.trim()),
                MatchMethod::Fuzzy => self.match_fuzzy(&segment.normalized_title),
            })
    }

    fn match_exact(&self, title: &str) -> Option<TitleMatch> {
        let folded = fold_title(title);
        self.first_hit(MatchMethod::Exact, EXACT_CONFIDENCE, |anchor| {
            matches!(anchor, AnchorMatcher::Exact { folded: key, .. } if *key == folded)
        })
    }

    fn match_contains(&self, title: &str) -> Option<TitleMatch> {
        let lowered = title.to_lowercase();
        self.first_hit(MatchMethod::Contains, CONTAINS_CONFIDENCE, |anchor| {
            matches!(anchor, AnchorMatcher::Contains { lowered: needle, .. } if lowered.contains(needle.as_str()))
        })
    }

    fn match_regex(&self, raw_title: &str) -> Option<TitleMatch> {
        self.first_hit(MatchMethod::Regex, REGEX_CONFIDENCE, |anchor| {
            matches!(anchor, AnchorMatcher::Regex { regex } if regex.is_match(raw_title))
        })
    }

    fn match_fuzzy(&self, title: &str) -> Option<TitleMatch> {
        let threshold = self.ruleset.title_matching().fuzzy_threshold;
        let lowered = title.to_lowercase();
        let mut best: Option<(f64, &str)> = None;

        for section in self.ruleset.sections() {
            for text in section.anchors.iter().filter_map(AnchorMatcher::fuzzy_text) {
                let ratio = indel::normalized_similarity(
                    lowered.chars(),
                    text.to_lowercase().chars(),
                );
                let improves = best.map_or(true, |(score, _)| ratio > score);
                if ratio >= threshold && improves {
                    best = Some((ratio, section.id.as_str()));
                }
            }
        }

        best.map(|(ratio, id)| TitleMatch {
            section_id: id.to_string(),
            confidence: ratio,
            method: MatchMethod::Fuzzy,
        })
    }

    /// First anchor in tree order accepted by `accept`.
    fn first_hit<F>(&self, method: MatchMethod, confidence: f64, accept: F) -> Option<TitleMatch>
    where
        F: Fn(&AnchorMatcher) -> bool,
    {
        self.ruleset
            .sections()
            .iter()
            .find(|section| section.anchors.iter().any(&accept))
            .map(|section| TitleMatch {
                section_id: section.id.clone(),
                confidence,
                method,
            })
    }
}
