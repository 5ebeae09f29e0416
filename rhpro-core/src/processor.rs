use crate::normalizer::{NormalizationOutput, Normalizer};
use crate::rules::section_detection::Segmenter;
use crate::rules::title_mapping::TitleMapper;
use crate::ruleset::Ruleset;
use crate::types::*;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::{Duration, Instant};

/// Captured intermediate outputs from each pipeline stage
/// Used for testing and diagnostics: lets you inspect/compare each boundary
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineStages {
    pub segments: Vec<Segment>,
    pub mapped_segments: Vec<Segment>,
    pub result: ParseResult,
}

/// Simple profiler that collects timings for pipeline steps
pub struct StepProfiler {
    enabled: bool,
    timings: Vec<(String, Duration)>,
}

impl StepProfiler {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub fn time_step<F, R>(&mut self, step_name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        if !self.enabled {
            return f();
        }

        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        tracing::info!(step = step_name, elapsed_us = elapsed.as_micros() as u64, "step finished");
        self.timings.push((step_name.to_string(), elapsed));

        result
    }

    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub fn print_summary(&self) {
        if !self.enabled || self.timings.is_empty() {
            return;
        }

        println!("\n📊 Performance Summary:");
        let total: Duration = self.timings.iter().map(|(_, d)| *d).sum();

        for (step, duration) in &self.timings {
            let percentage = if total.is_zero() {
                0.0
            } else {
                (duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            };
            println!(
                "   {:.<35} {:.3}ms ({:.1}%)",
                step,
                duration.as_secs_f64() * 1000.0,
                percentage
            );
        }
        println!("   {:.<35} {:.3}ms", "Total", total.as_secs_f64() * 1000.0);
    }
}

/// Paragraphs → segments → mapped segments → normalized document + report.
///
/// Holds a loaded ruleset and an optional output template; each parse call
/// builds its own segments and document, so one processor can serve many
/// documents.
pub struct DocumentProcessor {
    ruleset: Ruleset,
    template: Option<NormalizedDocument>,
}

impl DocumentProcessor {
    pub fn new(ruleset: Ruleset) -> Self {
        Self {
            ruleset,
            template: None,
        }
    }

    /// Processor over the ruleset bundled with the crate
    pub fn builtin() -> Result<Self> {
        let ruleset = Ruleset::builtin().context("Failed to load bundled ruleset")?;
        Ok(Self::new(ruleset))
    }

    /// Processor with ruleset loaded from file (YAML, or JSON by extension)
    pub fn from_ruleset_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ruleset = Ruleset::load(path)
            .with_context(|| format!("Failed to load ruleset from {}", path.display()))?;
        Ok(Self::new(ruleset))
    }

    pub fn with_template(mut self, template: NormalizedDocument) -> Self {
        self.template = Some(template);
        self
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    /// Run the whole pipeline. Never fails: unrecognized structure shows up
    /// in the report instead.
    pub fn parse(&self, paragraphs: &[Paragraph], gate_profile: Option<&str>) -> ParseResult {
        self.parse_with_profiler(paragraphs, gate_profile, &mut StepProfiler::new(false))
    }

    /// Same as [`parse`](Self::parse), printing per-step timings when
    /// `enable_profiling` is set.
    pub fn parse_with_profiling(
        &self,
        paragraphs: &[Paragraph],
        gate_profile: Option<&str>,
        enable_profiling: bool,
    ) -> ParseResult {
        let start_time = Instant::now();
        let mut profiler = StepProfiler::new(enable_profiling);
        let result = self.parse_with_profiler(paragraphs, gate_profile, &mut profiler);

        profiler.print_summary();
        if enable_profiling {
            println!(
                "⏱️  Total processing time: {:.3}ms",
                start_time.elapsed().as_secs_f64() * 1000.0
            );
        }
        result
    }

    fn parse_with_profiler(
        &self,
        paragraphs: &[Paragraph],
        gate_profile: Option<&str>,
        profiler: &mut StepProfiler,
    ) -> ParseResult {
        let mut segments = profiler.time_step("1. Segmentation", || {
            Segmenter::new(&self.ruleset).segment(paragraphs)
        });

        profiler.time_step("2. Title Mapping", || {
            TitleMapper::new(&self.ruleset).map_segments(&mut segments)
        });

        let output = profiler.time_step("3. Normalization + Report", || {
            self.normalizer().normalize(&segments, gate_profile)
        });

        self.finish(paragraphs.len(), segments.len(), output)
    }

    /// Run the pipeline and capture all intermediate stage outputs
    /// Used for pipeline diagnostics and testing stage boundaries
    pub fn parse_capture_stages(
        &self,
        paragraphs: &[Paragraph],
        gate_profile: Option<&str>,
    ) -> PipelineStages {
        let segments = Segmenter::new(&self.ruleset).segment(paragraphs);
        println!("📋 Stage 1: {} segments captured", segments.len());

        let mut mapped_segments = segments.clone();
        TitleMapper::new(&self.ruleset).map_segments(&mut mapped_segments);
        println!(
            "📋 Stage 2: {} of {} segments mapped",
            mapped_segments.iter().filter(|s| s.is_mapped()).count(),
            mapped_segments.len()
        );

        let output = self.normalizer().normalize(&mapped_segments, gate_profile);
        let result = self.finish(paragraphs.len(), mapped_segments.len(), output);
        println!(
            "📋 Stage 3: result captured ({} sections found, gate {})",
            result.report.found_sections.len(),
            result.status()
        );

        PipelineStages {
            segments,
            mapped_segments,
            result,
        }
    }

    fn normalizer(&self) -> Normalizer<'_> {
        let normalizer = Normalizer::new(&self.ruleset);
        match &self.template {
            Some(template) => normalizer.with_template(template),
            None => normalizer,
        }
    }

    fn finish(
        &self,
        paragraph_count: usize,
        segment_count: usize,
        output: NormalizationOutput,
    ) -> ParseResult {
        let gate = &output.report.production_gate;
        tracing::info!(
            paragraphs = paragraph_count,
            segments = segment_count,
            found = output.report.found_sections.len(),
            profile = %gate.profile,
            status = %gate.status,
            "document parsed"
        );

        ParseResult {
            schema_version: SCHEMA_VERSION.to_string(),
            ruleset: self.ruleset.info().clone(),
            normalized: output.normalized,
            report: output.report,
            provenance: output.provenance,
        }
    }
}

/// Parse with an already loaded ruleset, without building a processor.
pub fn parse_paragraphs(
    ruleset: &Ruleset,
    paragraphs: &[Paragraph],
    gate_profile: Option<&str>,
) -> ParseResult {
    let mut segments = Segmenter::new(ruleset).segment(paragraphs);
    TitleMapper::new(ruleset).map_segments(&mut segments);
    let output = Normalizer::new(ruleset).normalize(&segments, gate_profile);

    ParseResult {
        schema_version: SCHEMA_VERSION.to_string(),
        ruleset: ruleset.info().clone(),
        normalized: output.normalized,
        report: output.report,
        provenance: output.provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraphs() -> Vec<Paragraph> {
        vec![
            Paragraph::new("Vocation").with_style("Heading 1"),
            Paragraph::new("Cuisinier en collectivité"),
            Paragraph::new("Conclusion").with_style("Heading 1"),
            Paragraph::new("Mesure à poursuivre."),
        ]
    }

    #[test]
    fn profiler_disabled_records_nothing() {
        let mut profiler = StepProfiler::new(false);
        let value = profiler.time_step("noop", || 42);
        assert_eq!(value, 42);
        assert!(profiler.timings().is_empty());
    }

    #[test]
    fn profiler_records_steps_in_order() {
        let mut profiler = StepProfiler::new(true);
        profiler.time_step("a", || ());
        profiler.time_step("b", || ());
        let names: Vec<&str> = profiler.timings().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn parse_fills_result_header() {
        let processor = DocumentProcessor::builtin().unwrap();
        let result = processor.parse(&paragraphs(), None);
        assert_eq!(result.schema_version, SCHEMA_VERSION);
        assert_eq!(result.ruleset.doc_type, "bilan_orientation");
        assert_eq!(result.ruleset.fingerprint.len(), 64);
        assert_eq!(result.normalized.get_str("vocation"), Some("Cuisinier en collectivité"));
    }

    #[test]
    fn all_entry_points_agree() {
        let processor = DocumentProcessor::builtin().unwrap();
        let plain = processor.parse(&paragraphs(), None);
        let profiled = processor.parse_with_profiling(&paragraphs(), None, true);
        let stages = processor.parse_capture_stages(&paragraphs(), None);
        let free = parse_paragraphs(processor.ruleset(), &paragraphs(), None);

        assert_eq!(plain, profiled);
        assert_eq!(plain, stages.result);
        assert_eq!(plain, free);
        assert_eq!(stages.segments.len(), 2);
        assert!(stages.segments.iter().all(|s| !s.is_mapped()));
        assert!(stages.mapped_segments.iter().all(Segment::is_mapped));
    }
}
