// RH-Pro Core Library
//
// Classifies the sections of an orientation report (bilan) against a
// declarative ruleset and decides whether the result is fit for production.
// Main interface: paragraphs in, normalized document + coverage report out.

pub mod types;
pub mod error;
pub mod config;
pub mod ruleset;
pub mod text;
pub mod rules;
pub mod normalizer;
pub mod coverage;
pub mod classifier;
pub mod gate;
pub mod processor;

// Re-export main types and functions for easy use
pub use types::*;
pub use config::RulesetConfig;
pub use error::{RulesetError, RulesetResult};
pub use ruleset::Ruleset;
pub use processor::{parse_paragraphs, DocumentProcessor, PipelineStages, StepProfiler};
pub use rules::{Segmenter, TitleMapper};
pub use normalizer::{NormalizationOutput, Normalizer};
pub use gate::evaluate_production_gate;
