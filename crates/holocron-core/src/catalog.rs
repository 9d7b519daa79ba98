//! The static, ordered list of titles in the watch order.
//!
//! The catalog is read-only input: nothing in the tracker ever mutates it.
//! A built-in catalog is compiled in from `data/watch_order.toml`; callers may
//! load their own with [`Catalog::from_toml`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::HolocronError;

const BUILTIN_CATALOG: &str = include_str!("../../../data/watch_order.toml");

/// Whether a title is a film or an episodic series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => f.write_str("Movie"),
            Self::Series => f.write_str("Series"),
        }
    }
}

/// How optional a title is to the overall story, shown as one to three stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    OptionalAnthology = 1,
    Supplementary = 2,
    Skippable = 3,
}

impl Tier {
    /// Badge text: `*`, `**` or `***`.
    pub fn badge(&self) -> &'static str {
        match self {
            Self::OptionalAnthology => "*",
            Self::Supplementary => "**",
            Self::Skippable => "***",
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::OptionalAnthology),
            2 => Ok(Self::Supplementary),
            3 => Ok(Self::Skippable),
            other => Err(format!("tier must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier as u8
    }
}

/// One title in the watch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable slug. Derived from `title` and `year` when omitted in the source file.
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub year: u16,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Estimated runtime in minutes, used until real metadata arrives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_estimate: Option<u32>,
}

impl CatalogEntry {
    pub fn is_movie(&self) -> bool {
        self.kind == MediaKind::Movie
    }

    pub fn is_series(&self) -> bool {
        self.kind == MediaKind::Series
    }

    /// Case-insensitive substring match on the title.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty() || self.title.to_lowercase().contains(&query.to_lowercase())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    title: Vec<CatalogEntry>,
}

/// Ordered watch-order catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog, filling in missing slugs and rejecting duplicates.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, HolocronError> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(entries.len());
        for mut entry in entries {
            if entry.id.trim().is_empty() {
                entry.id = slugify(&format!("{} {}", entry.title, entry.year));
            }
            if entry.id.is_empty() {
                return Err(HolocronError::Catalog(format!(
                    "entry {:?} has no usable id",
                    entry.title
                )));
            }
            if !seen.insert(entry.id.clone()) {
                return Err(HolocronError::Catalog(format!("duplicate id {:?}", entry.id)));
            }
            out.push(entry);
        }
        Ok(Self { entries: out })
    }

    /// Parse a catalog from TOML with a `[[title]]` array.
    pub fn from_toml(source: &str) -> Result<Self, HolocronError> {
        let file: CatalogFile =
            toml::from_str(source).map_err(|e| HolocronError::Catalog(e.to_string()))?;
        Self::new(file.title)
    }

    /// The compiled-in watch order.
    pub fn builtin() -> Self {
        Self::from_toml(BUILTIN_CATALOG).expect("built-in catalog is valid")
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// `true` if `id` names a series in this catalog.
    pub fn is_series(&self, id: &str) -> bool {
        self.get(id).is_some_and(CatalogEntry::is_series)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercase ASCII slug: runs of anything but `a-z0-9` become a single `-`,
/// with leading and trailing dashes trimmed. Accents are folded first.
pub fn slugify(s: &str) -> String {
    let folded: String = s.nfkd().filter(char::is_ascii).collect();
    let mut slug = String::with_capacity(folded.len());
    let mut pending_dash = false;
    for c in folded.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(
            slugify("Star Wars: The Phantom Menace 1999"),
            "star-wars-the-phantom-menace-1999"
        );
        assert_eq!(slugify("Obi-Wan Kenobi 2022"), "obi-wan-kenobi-2022");
        assert_eq!(slugify("  --Andor--  "), "andor");
        assert_eq!(slugify("Pokémon"), "pokemon");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 27);

        let first = &catalog.entries()[0];
        assert_eq!(first.id, "the-acolyte-2024");
        assert!(first.is_series());

        let clone_wars = catalog.get("star-wars-the-clone-wars-series-2008").unwrap();
        assert_eq!(clone_wars.runtime_estimate, Some(2952));
        assert!(catalog.is_series("andor-2022"));
        assert_eq!(catalog.get("andor-2022").unwrap().tier, Some(Tier::Supplementary));
        assert!(!catalog.is_series("star-wars-a-new-hope-1977"));
    }

    #[test]
    fn test_missing_id_is_derived() {
        let catalog = Catalog::from_toml(
            r#"
            [[title]]
            title = "Andor"
            year = 2022
            kind = "series"
            "#,
        )
        .unwrap();
        assert_eq!(catalog.entries()[0].id, "andor-2022");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let source = r#"
            [[title]]
            id = "a"
            title = "A"
            year = 2000
            kind = "movie"

            [[title]]
            id = "a"
            title = "A again"
            year = 2001
            kind = "movie"
        "#;
        assert!(Catalog::from_toml(source).is_err());
    }

    #[test]
    fn test_invalid_tier_rejected() {
        let source = r#"
            [[title]]
            title = "A"
            year = 2000
            kind = "movie"
            tier = 4
        "#;
        assert!(Catalog::from_toml(source).is_err());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let catalog = Catalog::builtin();
        let entry = catalog.get("the-mandalorian-2019").unwrap();
        assert!(entry.matches("MANDO"));
        assert!(entry.matches("  "));
        assert!(!entry.matches("boba"));
    }
}
