//! RFC 5646 language tags.
//!
//! This is a structural parser covering the subtags DCP metadata actually
//! uses: primary language, extended language, script, region and variants.
//! Extension and private-use singletons are rejected.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A region subtag: two letters (ISO 3166-1) or three digits (UN M.49).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSubtag(String);

impl RegionSubtag {
    /// Validate and normalise a region subtag to upper case.
    pub fn new(s: &str) -> Result<Self> {
        let valid = (s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()))
            || (s.len() == 3 && s.chars().all(|c| c.is_ascii_digit()));
        if !valid {
            return Err(Error::misc(format!("bad region subtag '{s}'")));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// The normalised subtag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A parsed RFC 5646 language tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTag {
    primary: String,
    extlang: Option<String>,
    script: Option<String>,
    region: Option<RegionSubtag>,
    variants: Vec<String>,
}

impl LanguageTag {
    /// Primary language subtag, lower case.
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Script subtag in title case, if present.
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    /// Region subtag, if present.
    pub fn region(&self) -> Option<&RegionSubtag> {
        self.region.as_ref()
    }

    /// Variant subtags.
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// The canonical string form.
    pub fn as_string(&self) -> String {
        let mut out = self.primary.clone();
        if let Some(e) = &self.extlang {
            out.push('-');
            out.push_str(e);
        }
        if let Some(s) = &self.script {
            out.push('-');
            out.push_str(s);
        }
        if let Some(r) = &self.region {
            out.push('-');
            out.push_str(r.as_str());
        }
        for v in &self.variants {
            out.push('-');
            out.push_str(v);
        }
        out
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

fn is_variant(s: &str) -> bool {
    let alnum = s.chars().all(|c| c.is_ascii_alphanumeric());
    alnum
        && ((5..=8).contains(&s.len())
            || (s.len() == 4 && s.chars().next().is_some_and(|c| c.is_ascii_digit())))
}

impl FromStr for LanguageTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::misc(format!("bad language tag '{s}'"));

        if s.is_empty() {
            return Err(bad());
        }

        let mut parts = s.split('-').peekable();

        let primary = parts.next().ok_or_else(bad)?;
        if !(2..=8).contains(&primary.len())
            || !primary.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(bad());
        }
        let mut tag = LanguageTag {
            primary: primary.to_ascii_lowercase(),
            extlang: None,
            script: None,
            region: None,
            variants: Vec::new(),
        };

        // Extended language: exactly three letters, only after a 2-3 letter
        // primary.
        if primary.len() <= 3 {
            if let Some(p) = parts.peek() {
                if p.len() == 3 && p.chars().all(|c| c.is_ascii_alphabetic()) && !is_variant(p) {
                    tag.extlang = Some(parts.next().unwrap().to_ascii_lowercase());
                }
            }
        }

        if let Some(p) = parts.peek() {
            if p.len() == 4 && p.chars().all(|c| c.is_ascii_alphabetic()) {
                let script = parts.next().unwrap();
                let mut chars = script.chars();
                let first = chars.next().unwrap().to_ascii_uppercase();
                tag.script = Some(format!("{}{}", first, chars.as_str().to_ascii_lowercase()));
            }
        }

        if let Some(p) = parts.peek() {
            if let Ok(region) = RegionSubtag::new(p) {
                parts.next();
                tag.region = Some(region);
            }
        }

        for p in parts {
            if !is_variant(p) {
                return Err(bad());
            }
            tag.variants.push(p.to_ascii_lowercase());
        }

        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_tags() {
        assert_eq!("en".parse::<LanguageTag>().unwrap().as_string(), "en");
        assert_eq!(
            "de-DE".parse::<LanguageTag>().unwrap().as_string(),
            "de-DE"
        );
        assert_eq!(
            "zh-Hant-TW".parse::<LanguageTag>().unwrap().as_string(),
            "zh-Hant-TW"
        );
    }

    #[test]
    fn test_case_normalisation() {
        let tag: LanguageTag = "EN-latn-gb".parse().unwrap();
        assert_eq!(tag.as_string(), "en-Latn-GB");
    }

    #[test]
    fn test_variants() {
        let tag: LanguageTag = "sl-rozaj-biske".parse().unwrap();
        assert_eq!(tag.variants(), ["rozaj", "biske"]);
    }

    #[test]
    fn test_numeric_region() {
        let tag: LanguageTag = "es-419".parse().unwrap();
        assert_eq!(tag.region().unwrap().as_str(), "419");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("".parse::<LanguageTag>().is_err());
        assert!("e".parse::<LanguageTag>().is_err());
        assert!("en-".parse::<LanguageTag>().is_err());
        assert!("123".parse::<LanguageTag>().is_err());
        assert!("en-x-private".parse::<LanguageTag>().is_err());
        assert!("this-is-not-a-language".parse::<LanguageTag>().is_err());
    }

    #[test]
    fn test_region_subtag() {
        assert!(RegionSubtag::new("GB").is_ok());
        assert!(RegionSubtag::new("419").is_ok());
        assert!(RegionSubtag::new("001").is_ok());
        assert!(RegionSubtag::new("G").is_err());
        assert!(RegionSubtag::new("41").is_err());
    }
}
