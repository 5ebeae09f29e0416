// All core functionality is in rhpro-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod output;

// Re-export core types for convenience
pub use rhpro_core::*;

// Re-export CLI utilities
pub use output::{
    default_output_path, load_paragraphs, load_template, render_profiles,
    render_summary_markdown, save_result, save_stages, save_summary,
};
