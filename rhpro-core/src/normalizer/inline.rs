//! Splits a composite section that arrived as one block of text into its
//! expected sub-keys, using in-text markers such as "Profession:".

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// One sub-key: a marker introducing it, and what ends it (end of text when
/// `terminator` is `None`).
struct InlineField {
    key: &'static str,
    marker: Regex,
    terminator: Option<Regex>,
}

struct InlineRule {
    parent: &'static str,
    fields: Vec<InlineField>,
}

fn marker(word: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{word}\b\s*(?:\n|:)\s*")).expect("static inline marker")
}

fn heading_terminator(word: &str) -> Option<Regex> {
    Some(Regex::new(&format!(r"(?i)\n\s*\b{word}\b\s*(?:\n|:)")).expect("static inline terminator"))
}

static INLINE_RULES: LazyLock<Vec<InlineRule>> = LazyLock::new(|| {
    vec![
        InlineRule {
            parent: "profession_formation",
            fields: vec![
                InlineField {
                    key: "profession",
                    marker: marker("Profession"),
                    terminator: heading_terminator("Formation"),
                },
                InlineField {
                    key: "formation",
                    marker: marker("Formation"),
                    // Any following line that starts with a word ends the block.
                    terminator: Some(
                        Regex::new(r"(?is)\n\s*\b[A-ZÀ-ÖØ-Þ].{2,}").expect("static inline terminator"),
                    ),
                },
            ],
        },
        InlineRule {
            parent: "orientation_formation",
            fields: vec![
                InlineField {
                    key: "orientation",
                    marker: marker("Orientation"),
                    terminator: heading_terminator("Stage"),
                },
                InlineField {
                    key: "stage",
                    marker: marker("Stage"),
                    terminator: None,
                },
            ],
        },
        InlineRule {
            parent: "competences",
            fields: vec![
                InlineField {
                    key: "sociales",
                    marker: marker("Sociales"),
                    terminator: heading_terminator("Professionnelles"),
                },
                InlineField {
                    key: "professionnelles",
                    marker: marker("Professionnelles"),
                    terminator: None,
                },
            ],
        },
    ]
});

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("static blank-line regex"));

fn rule_for(parent: &str) -> Option<&'static InlineRule> {
    INLINE_RULES.iter().find(|rule| rule.parent == parent)
}

pub fn composite_parents() -> impl Iterator<Item = &'static str> {
    INLINE_RULES.iter().map(|rule| rule.parent)
}

pub fn expected_keys(parent: &str) -> Vec<&'static str> {
    rule_for(parent)
        .map(|rule| rule.fields.iter().map(|f| f.key).collect())
        .unwrap_or_default()
}

/// Split `content` into the parent's sub-keys. Returns `None` when no
/// sub-key could be extracted at all.
pub fn split_inline(parent: &str, content: &str) -> Option<BTreeMap<String, String>> {
    let rule = rule_for(parent)?;
    if content.is_empty() {
        return None;
    }

    let result: BTreeMap<String, String> = rule
        .fields
        .iter()
        .map(|field| (field.key.to_string(), extract_field(field, content)))
        .collect();

    if result.values().all(String::is_empty) {
        return None;
    }
    Some(result)
}

fn extract_field(field: &InlineField, content: &str) -> String {
    for found in field.marker.find_iter(content) {
        let start = found.end();
        let Some(first) = content[start..].chars().next() else {
            continue;
        };
        // The body holds at least one character before a terminator may match.
        let search_from = start + first.len_utf8();
        let end = field
            .terminator
            .as_ref()
            .and_then(|re| re.find_at(content, search_from))
            .map(|m| m.start())
            .unwrap_or(content.len());

        let body = content[start..end].trim();
        return BLANK_LINES.replace_all(body, "\n").into_owned();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn split(parent: &str, content: &str) -> BTreeMap<String, String> {
        split_inline(parent, content).expect("split should succeed")
    }

    #[test]
    fn profession_and_formation() {
        let parts = split(
            "profession_formation",
            "Profession:\nMenuisier depuis 10 ans\n\nChef d'équipe\nFormation:\nCFC de menuisier",
        );
        assert_eq!(parts["profession"], "Menuisier depuis 10 ans\nChef d'équipe");
        assert_eq!(parts["formation"], "CFC de menuisier");
    }

    #[test]
    fn formation_stops_at_next_worded_line() {
        let parts = split(
            "profession_formation",
            "Formation : CFC de cuisinier\nRemarques diverses sur le parcours",
        );
        assert_eq!(parts["formation"], "CFC de cuisinier");
        assert_eq!(parts["profession"], "");
    }

    #[test]
    fn orientation_and_stage() {
        let parts = split(
            "orientation_formation",
            "Orientation\nLogistique\nStage:\nDeux semaines en entrepôt",
        );
        assert_eq!(parts["orientation"], "Logistique");
        assert_eq!(parts["stage"], "Deux semaines en entrepôt");
    }

    #[test]
    fn competences_split() {
        let parts = split(
            "competences",
            "Sociales: à l'aise en équipe\nProfessionnelles:\nPrécis et autonome",
        );
        assert_eq!(parts["sociales"], "à l'aise en équipe");
        assert_eq!(parts["professionnelles"], "Précis et autonome");
    }

    #[test]
    fn no_markers_means_failure() {
        assert!(split_inline("competences", "Texte libre sans sous-titres").is_none());
        assert!(split_inline("conclusion", "Profession: x").is_none());
    }

    #[test]
    fn expected_keys_per_parent() {
        assert_eq!(expected_keys("orientation_formation"), vec!["orientation", "stage"]);
        assert!(expected_keys("tests").is_empty());
        assert!(composite_parents().any(|parent| parent == "competences"));
        assert_eq!(composite_parents().count(), 3);
    }
}
