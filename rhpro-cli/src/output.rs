//! File input/output for the CLI: paragraph and template loading, result
//! and summary writing, stage dumps.

use anyhow::{Context, Result};
use rhpro_core::{NormalizedDocument, Paragraph, ParseResult, PipelineStages, Ruleset};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Paragraph list as written by the upstream document reader (JSON array).
pub fn load_paragraphs(path: impl AsRef<Path>) -> Result<Vec<Paragraph>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read paragraphs from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid paragraph list in {}", path.display()))
}

/// Output skeleton (JSON object) used instead of the ruleset-derived one.
pub fn load_template(path: impl AsRef<Path>) -> Result<NormalizedDocument> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid output template in {}", path.display()))
}

/// `<input stem>_rhpro.json` next to the current directory.
pub fn default_output_path(input: &str) -> String {
    let input_name = Path::new(input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    format!("{input_name}_rhpro.json")
}

pub fn save_result(result: &ParseResult, output_path: impl AsRef<Path>) -> Result<()> {
    let output_path = output_path.as_ref();
    let json = serde_json::to_string_pretty(result)?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write result to {}", output_path.display()))?;
    Ok(())
}

pub fn save_summary(result: &ParseResult, output_path: impl AsRef<Path>) -> Result<()> {
    let output_path = output_path.as_ref();
    fs::write(output_path, render_summary_markdown(result))
        .with_context(|| format!("Failed to write summary to {}", output_path.display()))?;
    Ok(())
}

/// Human-readable report: gate decision first, then coverage and sources.
pub fn render_summary_markdown(result: &ParseResult) -> String {
    let report = &result.report;
    let gate = &report.production_gate;
    let mut md = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(md, "# RH-Pro Parse Summary\n");
    let _ = writeln!(
        md,
        "**Ruleset**: {} v{} (`{}`)\n",
        result.ruleset.doc_type,
        result.ruleset.version,
        short_fingerprint(&result.ruleset.fingerprint)
    );

    let _ = writeln!(md, "## Production Gate\n");
    let _ = writeln!(md, "- **Status**: **{}**", gate.status);
    let forced = if gate.signals.forced { " (forced)" } else { "" };
    let _ = writeln!(md, "- **Profile**: `{}`{}", gate.profile, forced);
    let _ = writeln!(
        md,
        "- **Required Coverage**: {:.1}% (effective {:.1}%)",
        report.required_coverage_ratio * 100.0,
        gate.metrics.required_coverage_ratio_effective * 100.0
    );
    let _ = writeln!(md, "- **Coverage**: {:.1}%", report.coverage_ratio * 100.0);
    let _ = writeln!(
        md,
        "- **Weighted Coverage**: {:.1}%",
        report.weighted_coverage * 100.0
    );
    let _ = writeln!(md, "- **Unknown Titles**: {}", report.unknown_titles.len());
    let _ = writeln!(md, "- **Placeholders**: {}", report.placeholders.len());
    if !gate.reasons.is_empty() {
        let _ = writeln!(md, "- **Reasons**:");
        for reason in &gate.reasons {
            let _ = writeln!(md, "  - {reason}");
        }
    }
    md.push('\n');

    let _ = writeln!(md, "## Missing Required Sections\n");
    if report.missing_required_sections.is_empty() {
        let _ = writeln!(md, "None\n");
    } else {
        for id in &report.missing_required_sections {
            let ignored = if gate.missing_required_effective.contains(id) {
                ""
            } else {
                " (ignored by profile)"
            };
            let _ = writeln!(md, "- `{id}`{ignored}");
        }
        md.push('\n');
    }

    if !report.unknown_titles.is_empty() {
        let _ = writeln!(md, "## Unknown Titles\n");
        for title in &report.unknown_titles {
            let _ = writeln!(md, "- {title}");
        }
        md.push('\n');
    }

    let _ = writeln!(md, "## Provenance\n");
    let _ = writeln!(md, "| Section | Source title | Method | Confidence | Paragraphs |");
    let _ = writeln!(md, "|---|---|---|---|---|");
    for (id, entry) in &result.provenance {
        let method = entry.match_method.map(|m| m.as_str()).unwrap_or("-");
        let _ = writeln!(
            md,
            "| `{}` | {} | {} | {:.2} | {} |",
            id,
            entry.source_title.replace('|', "\\|"),
            method,
            entry.confidence,
            entry.paragraph_count
        );
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(md, "\n## Warnings\n");
        for warning in &report.warnings {
            let _ = writeln!(md, "- {warning}");
        }
    }

    md
}

fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

/// Gate profiles of a ruleset with their thresholds, for `--show-profiles`.
pub fn render_profiles(ruleset: &Ruleset) -> String {
    let mut out = String::new();
    let default_profile = ruleset.default_profile();
    for id in ruleset.profile_ids() {
        let Some(profile) = ruleset.profile(id) else {
            continue;
        };
        let marker = if id == default_profile { " (default)" } else { "" };
        let _ = writeln!(out, "  {id}{marker}");
        if let Some(description) = &profile.description {
            let _ = writeln!(out, "      {description}");
        }
        let t = &profile.thresholds;
        let _ = writeln!(
            out,
            "      max_missing_required={} min_required_coverage_ratio={:.2} max_unknown_titles={} max_placeholders={}",
            t.max_missing_required, t.min_required_coverage_ratio, t.max_unknown_titles, t.max_placeholders
        );
        if !profile.ignore_required_prefixes.is_empty() {
            let _ = writeln!(
                out,
                "      ignores: {}",
                profile.ignore_required_prefixes.join(", ")
            );
        }
    }
    out
}

pub fn save_stages(stages: &PipelineStages, output_dir: &str, input_name: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create stage directory {output_dir}"))?;

    // Stage 1: Segments
    let seg_path = format!("{}/stage1_segments.json", output_dir);
    fs::write(&seg_path, serde_json::to_string_pretty(&stages.segments)?)?;
    println!("  💾 {} ({} segments)", seg_path, stages.segments.len());

    // Stage 2: Mapped segments
    let mapped_path = format!("{}/stage2_mapped_segments.json", output_dir);
    fs::write(&mapped_path, serde_json::to_string_pretty(&stages.mapped_segments)?)?;
    let mapped_count = stages.mapped_segments.iter().filter(|s| s.is_mapped()).count();
    println!("  💾 {} ({} mapped)", mapped_path, mapped_count);

    // Stage 3: Final result
    let result_path = format!("{}/stage3_result.json", output_dir);
    save_result(&stages.result, &result_path)?;
    println!("  💾 {} (gate {})", result_path, stages.result.status());

    // Summary file: quick reference for validation scripts
    let report = &stages.result.report;
    let summary = serde_json::json!({
        "input": input_name,
        "captured_at": chrono::Utc::now().to_rfc3339(),
        "ruleset_fingerprint": stages.result.ruleset.fingerprint,
        "stage_counts": {
            "segments": stages.segments.len(),
            "mapped_segments": mapped_count,
            "found_sections": report.found_sections.len(),
            "unknown_titles": report.unknown_titles.len(),
            "placeholders": report.placeholders.len(),
        },
        "gate": {
            "profile": report.production_gate.profile,
            "status": report.production_gate.status,
        }
    });
    let summary_path = format!("{}/summary.json", output_dir);
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    println!("  💾 {}", summary_path);

    Ok(())
}
