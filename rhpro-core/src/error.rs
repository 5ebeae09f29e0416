use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, surfaced while a ruleset is loaded.
///
/// Classification ambiguity is never reported through this type: unmapped
/// titles, missing sections and failed inline splits end up in the
/// coverage report instead.
#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("failed to read ruleset {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ruleset YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid ruleset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ruleset is missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("section id must not be empty (label: {label:?})")]
    EmptySectionId { label: String },

    #[error("duplicate section id `{0}`")]
    DuplicateSectionId(String),

    #[error("child section `{child}` does not extend its parent id `{parent}`")]
    ChildIdOutsideParent { parent: String, child: String },

    #[error("invalid regex in {context}: `{pattern}`")]
    InvalidRegex {
        context: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("fuzzy_threshold must be within 0.0..=1.0, got {0}")]
    InvalidFuzzyThreshold(f64),

    #[error("production_gate.default_profile `{0}` is not defined in production_gate.profiles")]
    UnknownDefaultProfile(String),
}

pub type RulesetResult<T> = std::result::Result<T, RulesetError>;
