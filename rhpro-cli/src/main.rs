use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

// Import from rhpro-core
use rhpro_core::{DocumentProcessor, ParseResult, Ruleset};

// Import CLI utilities
use rhpro_cli::{
    default_output_path, load_paragraphs, load_template, render_profiles, save_result,
    save_stages, save_summary,
};

#[derive(Parser)]
#[command(name = "rhpro")]
#[command(about = "Classifies the sections of an orientation report and runs the production gate")]
struct Args {
    /// Path to the paragraph list (JSON array produced by the document reader)
    #[arg(short, long)]
    input: Option<String>,

    /// Path to a custom ruleset (YAML, or JSON with a .json extension)
    /// If not specified, uses the bundled rhpro_v1 ruleset
    #[arg(short, long)]
    ruleset: Option<String>,

    /// Path to a JSON output template replacing the ruleset-derived skeleton
    #[arg(short, long)]
    template: Option<String>,

    /// Force a production-gate profile instead of auto-selecting one
    #[arg(short, long)]
    gate_profile: Option<String>,

    /// Output file path (if not specified, auto-generated based on input)
    #[arg(short, long)]
    output: Option<String>,

    /// Also write a Markdown summary to this path
    #[arg(long)]
    summary: Option<String>,

    /// Show the ruleset's gate profiles and exit
    #[arg(long)]
    show_profiles: bool,

    /// Enable detailed profiling of all pipeline steps
    #[arg(long)]
    profile: bool,

    /// Dump all intermediate pipeline stage outputs to a directory
    /// Captures: segments, mapped segments and the final result as separate files
    #[arg(long)]
    dump_stages: bool,

    /// Directory for stage dump output (default: test_outputs/stages)
    #[arg(long, default_value = "test_outputs/stages")]
    stages_dir: String,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    if let Err(err) = run(Args::parse()) {
        tracing::error!("{err:#}");
        eprintln!("❌ {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    println!("🦀 RH-Pro Document Classifier");

    let processor = create_processor(&args)?;

    if args.show_profiles {
        show_profiles(processor.ruleset());
        return Ok(());
    }

    let input = args
        .input
        .as_deref()
        .context("No input given: pass --input <paragraphs.json>")?;
    if !Path::new(input).exists() {
        anyhow::bail!("Input paragraphs not found at: {input}");
    }

    let paragraphs = load_paragraphs(input)?;
    println!("📄 Processing: {} ({} paragraphs)", input, paragraphs.len());

    let gate_profile = args.gate_profile.as_deref();
    if let Some(profile) = gate_profile {
        println!("🎯 Gate profile forced: {profile}");
    }

    // Stage dump mode: capture and save all intermediates
    if args.dump_stages {
        println!("\n🔬 Pipeline stage dump mode");
        let stages = processor.parse_capture_stages(&paragraphs, gate_profile);
        save_stages(&stages, &args.stages_dir, input)?;
        println!("\n✅ All stages dumped to: {}", args.stages_dir);
        return Ok(());
    }

    let result = processor.parse_with_profiling(&paragraphs, gate_profile, args.profile);
    print_report(&result);

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input));
    save_result(&result, &output_path)?;
    println!("💾 Result saved to: {}", output_path);

    if let Some(summary_path) = &args.summary {
        save_summary(&result, summary_path)?;
        println!("💾 Summary saved to: {}", summary_path);
    }

    Ok(())
}

fn create_processor(args: &Args) -> Result<DocumentProcessor> {
    let processor = match &args.ruleset {
        Some(path) => {
            let processor = DocumentProcessor::from_ruleset_file(path)?;
            println!("📋 Loaded ruleset from: {}", path);
            processor
        }
        None => {
            println!("📋 Using bundled ruleset");
            DocumentProcessor::builtin()?
        }
    };

    let info = processor.ruleset().info();
    println!(
        "   {} v{} ({}) fingerprint {}",
        info.doc_type, info.version, info.language, info.fingerprint
    );

    match &args.template {
        Some(path) => {
            let template = load_template(path)?;
            println!("📐 Loaded output template from: {}", path);
            Ok(processor.with_template(template))
        }
        None => Ok(processor),
    }
}

fn print_report(result: &ParseResult) {
    let report = &result.report;
    let gate = &report.production_gate;

    println!("✅ Successfully processed document");
    println!("📊 Coverage:");
    println!("   - Sections found: {}", report.found_sections.len());
    println!("   - Unknown titles: {}", report.unknown_titles.len());
    println!(
        "   - Required coverage: {:.1}%",
        report.required_coverage_ratio * 100.0
    );
    println!("   - Weighted coverage: {:.1}%", report.weighted_coverage * 100.0);
    println!("   - Placeholders: {}", report.placeholders.len());

    let icon = if gate.status.is_go() { "🟢" } else { "🔴" };
    println!("{} Production gate: {} (profile {})", icon, gate.status, gate.profile);
    for reason in &gate.reasons {
        println!("   - {}", reason);
    }
    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }
}

fn show_profiles(ruleset: &Ruleset) {
    println!("\n📋 Production gate profiles:");
    print!("{}", render_profiles(ruleset));

    println!("\n📝 Usage Examples:");
    println!("  cargo run -- -i paragraphs.json");
    println!("  cargo run -- -i paragraphs.json -o result.json --summary summary.md");
    println!("  cargo run -- -i paragraphs.json -r ruleset.yaml -g bilan_complet");
    println!("  cargo run -- -i paragraphs.json --dump-stages --stages-dir out/stages");
}
