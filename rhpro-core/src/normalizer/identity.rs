//! AVS number and civility-name extraction for the identity section.

use regex::Regex;
use std::sync::LazyLock;

/// 13-digit Swiss social insurance number, separators optional.
static AVS_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b756[\s.\-]?[0-9]{4}[\s.\-]?[0-9]{4}[\s.\-]?[0-9]{2}\b").expect("static AVS regex")
});

/// "Monsieur Jean DUPONT - 756..." : the name runs up to a dash before the AVS.
static NAME_BEFORE_AVS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Monsieur|Madame|M\.|Mme)\s+(.+?)\s*[–—\-]\s*756")
        .expect("static name regex")
});

/// Looser form: the name stops at an en/em dash, the AVS, or the end of line.
static NAME_LOOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)\b(?:Monsieur|Madame|M\.|Mme)\s+(.+?)\s*(?:[–—]|\b756|$)")
        .expect("static loose name regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFields {
    pub avs: String,
    pub name: String,
    pub surname: String,
    pub full_name: String,
}

impl IdentityFields {
    pub fn is_empty(&self) -> bool {
        self.avs.is_empty() && self.name.is_empty() && self.surname.is_empty() && self.full_name.is_empty()
    }

    pub fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("avs", self.avs.as_str()),
            ("name", self.name.as_str()),
            ("surname", self.surname.as_str()),
            ("full_name", self.full_name.as_str()),
        ]
    }

    /// Fill only the fields that are still empty.
    pub fn fill_gaps(&mut self, other: IdentityFields) {
        for (slot, value) in [
            (&mut self.avs, other.avs),
            (&mut self.name, other.name),
            (&mut self.surname, other.surname),
            (&mut self.full_name, other.full_name),
        ] {
            if slot.is_empty() {
                *slot = value;
            }
        }
    }
}

pub fn contains_avs(text: &str) -> bool {
    AVS_NUMBER.is_match(text)
}

/// First AVS number in `text`, re-emitted as `756.XXXX.XXXX.XX`.
pub fn find_avs(text: &str) -> Option<String> {
    let found = AVS_NUMBER.find(text)?;
    let digits: String = found.as_str().chars().filter(char::is_ascii_digit).collect();
    Some(format!(
        "{}.{}.{}.{}",
        &digits[0..3],
        &digits[3..7],
        &digits[7..11],
        &digits[11..13]
    ))
}

pub fn extract_identity(text: &str) -> IdentityFields {
    let mut fields = IdentityFields {
        avs: find_avs(text).unwrap_or_default(),
        ..IdentityFields::default()
    };

    let captured = NAME_BEFORE_AVS
        .captures(text)
        .or_else(|| NAME_LOOSE.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty());

    if let Some(full_name) = captured {
        let parts: Vec<&str> = full_name.split_whitespace().collect();
        if let Some((surname, given)) = parts.split_last() {
            fields.surname = (*surname).to_string();
            fields.name = given.join(" ");
        }
        fields.full_name = full_name;
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn civility_name_and_avs_with_en_dash() {
        let fields = extract_identity("Monsieur Jean Paul DUPONT – 756.1234.5678.90");
        assert_eq!(
            fields,
            IdentityFields {
                avs: "756.1234.5678.90".to_string(),
                name: "Jean Paul".to_string(),
                surname: "DUPONT".to_string(),
                full_name: "Jean Paul DUPONT".to_string(),
            }
        );
    }

    #[test]
    fn avs_separators_are_normalized() {
        assert_eq!(find_avs("AVS: 756 1234 5678 90").as_deref(), Some("756.1234.5678.90"));
        assert_eq!(find_avs("756-1234-5678-90").as_deref(), Some("756.1234.5678.90"));
        assert_eq!(find_avs("7561234567890").as_deref(), Some("756.1234.5678.90"));
        assert_eq!(find_avs("numéro 1234"), None);
    }

    #[test]
    fn hyphenated_first_name_survives() {
        let fields = extract_identity("Madame Marie-Claire MARTIN - 756.9999.8888.77");
        assert_eq!(fields.name, "Marie-Claire");
        assert_eq!(fields.surname, "MARTIN");
    }

    #[test]
    fn name_without_avs_runs_to_end_of_line() {
        let fields = extract_identity("Mme Sophie ROCHAT\nNée le 3 mars 1985");
        assert_eq!(fields.full_name, "Sophie ROCHAT");
        assert_eq!(fields.surname, "ROCHAT");
        assert!(fields.avs.is_empty());
    }

    #[test]
    fn single_token_name_is_a_surname() {
        let fields = extract_identity("M. MULLER – 756.1111.2222.33");
        assert_eq!(fields.surname, "MULLER");
        assert_eq!(fields.name, "");
    }

    #[test]
    fn fill_gaps_never_overwrites() {
        let mut base = extract_identity("AVS 756.1234.5678.90");
        base.fill_gaps(extract_identity("Monsieur Paul ROTH – 756.0000.0000.00"));
        assert_eq!(base.avs, "756.1234.5678.90");
        assert_eq!(base.surname, "ROTH");
    }
}
