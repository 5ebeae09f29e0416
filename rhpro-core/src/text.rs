//! Small string helpers shared by the segmenter, mapper and report code.

use crate::config::NormalizeConfig;
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static whitespace regex"));

const NBSP: char = '\u{a0}';

/// Apply the ruleset's title transforms in their fixed order:
/// trim, collapse whitespace, strip trailing colon, uppercase, remove nbsp.
pub fn normalize_title(text: &str, config: &NormalizeConfig) -> String {
    let mut result = text.to_string();

    if config.trim {
        result = result.trim().to_string();
    }
    if config.collapse_whitespace {
        result = WHITESPACE_RUN.replace_all(&result, " ").into_owned();
    }
    if config.strip_trailing_colon {
        result = result.trim_end_matches(':').trim().to_string();
    }
    if config.uppercase {
        result = result.to_uppercase();
    }
    if config.remove_nbsp {
        result = result.replace(NBSP, " ");
    }

    result
}

/// Comparison key for exact title matching: lowercase, accents stripped,
/// punctuation turned into spaces, whitespace collapsed.
///
/// "Orientation, Formation & STage" and "orientation formation stage" fold
/// to the same key.
pub fn fold_title(text: &str) -> String {
    let lowered = text.to_lowercase().replace('ß', "ss");
    let stripped: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let depunctuated: String = stripped
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    depunctuated.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `text`.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Up to `radius` characters on each side of the byte range `start..end`.
pub fn context_window(text: &str, start: usize, end: usize, radius: usize) -> String {
    if radius == 0 {
        return text[start..end].to_string();
    }
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(radius - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(radius)
        .map(|(idx, _)| end + idx)
        .unwrap_or(text.len());
    text[from..to].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_transforms() -> NormalizeConfig {
        NormalizeConfig {
            trim: true,
            collapse_whitespace: true,
            strip_trailing_colon: true,
            uppercase: true,
            remove_nbsp: true,
        }
    }

    #[test]
    fn title_transforms_apply_in_order() {
        let title = normalize_title("  Profession   et\u{a0}formation :  ", &all_transforms());
        assert_eq!(title, "PROFESSION ET FORMATION");
    }

    #[test]
    fn disabled_transforms_leave_text_alone() {
        let raw = " Conclusion: ";
        assert_eq!(normalize_title(raw, &NormalizeConfig::default()), raw);
    }

    #[test]
    fn fold_title_strips_accents_and_punctuation() {
        assert_eq!(
            fold_title("Orientation, Formation & STage"),
            "orientation formation stage"
        );
        assert_eq!(fold_title("COMPÉTENCES"), "competences");
        assert_eq!(fold_title("Données d'identité"), "donnees d identite");
    }

    #[test]
    fn snippet_counts_characters() {
        assert_eq!(snippet("éééé", 2), "éé");
        assert_eq!(snippet("ab", 10), "ab");
    }

    #[test]
    fn context_window_respects_char_boundaries() {
        let text = "àààTODOééé";
        let start = text.find("TODO").unwrap();
        let end = start + 4;
        assert_eq!(context_window(text, start, end, 2), "ààTODOéé");
        assert_eq!(context_window(text, start, end, 50), text);
    }
}
