use crate::config::{DetectorKind, HeuristicDetectionConfig, StyleLevel};
use crate::ruleset::Ruleset;
use crate::text::normalize_title;
use crate::types::{Paragraph, Segment};
use regex::Regex;

/// Most words a heuristic heading may have before it reads as a sentence.
const MAX_HEADING_WORDS: usize = 15;

/// Level assigned to headings found by the heuristic detector.
const HEURISTIC_LEVEL: u32 = 2;

/// One way of recognizing a heading paragraph. Returns the heading level.
pub trait HeadingDetector {
    fn detect(&self, paragraph: &Paragraph) -> Option<u32>;
    fn name(&self) -> &str;
}

/// Word paragraph styles mapped to heading levels.
pub struct StyleHeadingDetector<'a> {
    styles: &'a [StyleLevel],
}

impl<'a> StyleHeadingDetector<'a> {
    pub fn new(styles: &'a [StyleLevel]) -> Self {
        Self { styles }
    }
}

impl HeadingDetector for StyleHeadingDetector<'_> {
    fn detect(&self, paragraph: &Paragraph) -> Option<u32> {
        let style = paragraph.style_name.as_deref()?;
        self.styles
            .iter()
            .find(|s| s.name == style)
            .map(|s| s.level)
    }

    fn name(&self) -> &str {
        "by_style"
    }
}

/// Numbered-title patterns anchored at the start of the paragraph. The level
/// comes from the list numbering, not from the text.
pub struct RegexHeadingDetector<'a> {
    patterns: &'a [Regex],
}

impl<'a> RegexHeadingDetector<'a> {
    pub fn new(patterns: &'a [Regex]) -> Self {
        Self { patterns }
    }
}

impl HeadingDetector for RegexHeadingDetector<'_> {
    fn detect(&self, paragraph: &Paragraph) -> Option<u32> {
        if !self.patterns.iter().any(|re| re.is_match(&paragraph.text)) {
            return None;
        }
        let level = match &paragraph.numbering_prefix {
            Some(prefix) => prefix.matches('.').count() as u32 + 1,
            None => 1,
        };
        Some(level)
    }

    fn name(&self) -> &str {
        "by_regex"
    }
}

/// Short (and by default bold) lines that do not read like a sentence.
pub struct HeuristicHeadingDetector {
    max_length: usize,
    prefer_bold: bool,
}

impl HeuristicHeadingDetector {
    pub fn new(config: &HeuristicDetectionConfig) -> Self {
        Self {
            max_length: config.max_length,
            prefer_bold: config.prefer_bold,
        }
    }
}

impl HeadingDetector for HeuristicHeadingDetector {
    fn detect(&self, paragraph: &Paragraph) -> Option<u32> {
        let text = paragraph.text.trim();
        if text.ends_with('.') || text.split_whitespace().count() > MAX_HEADING_WORDS {
            return None;
        }
        if paragraph.text.chars().count() > self.max_length {
            return None;
        }
        if self.prefer_bold && !paragraph.is_bold {
            return None;
        }
        Some(HEURISTIC_LEVEL)
    }

    fn name(&self) -> &str {
        "by_heuristics"
    }
}

/// Splits a paragraph stream into titled segments.
pub struct Segmenter<'a> {
    ruleset: &'a Ruleset,
    detectors: Vec<Box<dyn HeadingDetector + 'a>>,
}

impl<'a> Segmenter<'a> {
    pub fn new(ruleset: &'a Ruleset) -> Self {
        let config = ruleset.heading_detection();
        let mut detectors: Vec<Box<dyn HeadingDetector + 'a>> = Vec::new();

        for kind in &config.order {
            match kind {
                DetectorKind::ByStyle => {
                    if let Some(by_style) = config.by_style.as_ref().filter(|c| c.enabled) {
                        detectors.push(Box::new(StyleHeadingDetector::new(&by_style.styles)));
                    }
                }
                DetectorKind::ByRegex => {
                    if config.by_regex.as_ref().is_some_and(|c| c.enabled) {
                        detectors.push(Box::new(RegexHeadingDetector::new(
                            ruleset.heading_patterns(),
                        )));
                    }
                }
                DetectorKind::ByHeuristics => {
                    if let Some(heuristics) = config.by_heuristics.as_ref().filter(|c| c.enabled) {
                        detectors.push(Box::new(HeuristicHeadingDetector::new(heuristics)));
                    }
                }
            }
        }

        Self { ruleset, detectors }
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// First detector (in configured order) that recognizes a heading wins.
    pub fn detect_heading(&self, paragraph: &Paragraph) -> Option<u32> {
        self.detectors.iter().find_map(|d| d.detect(paragraph))
    }

    /// Paragraphs before the first heading are dropped; blank paragraphs are
    /// skipped.
    pub fn segment(&self, paragraphs: &[Paragraph]) -> Vec<Segment> {
        let normalize = self.ruleset.normalize_config();
        let mut segments = Vec::new();
        let mut current: Option<Segment> = None;
        let mut dropped = 0usize;

        for paragraph in paragraphs {
            if paragraph.text.trim().is_empty() {
                continue;
            }

            if let Some(level) = self.detect_heading(paragraph) {
                if let Some(done) = current.take() {
                    segments.push(done);
                }
                current = Some(Segment::new(
                    paragraph.text.clone(),
                    normalize_title(&paragraph.text, normalize),
                    level,
                ));
            } else if let Some(open) = current.as_mut() {
                open.paragraphs.push(paragraph.clone());
            } else {
                dropped += 1;
            }
        }

        if let Some(done) = current {
            segments.push(done);
        }

        tracing::debug!(
            paragraphs = paragraphs.len(),
            segments = segments.len(),
            preamble_dropped = dropped,
            "segmentation done"
        );
        segments
    }
}
