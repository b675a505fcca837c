//! Declared timeline items.
//!
//! A timeline item is one provider reference in a universe's viewing order.
//! Source and kind are kept as the raw strings the user wrote, so that values
//! outside the supported sets reach the classifier and get reported instead of
//! being rejected while parsing the definitions file.

use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External catalog that issued an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSource {
    /// The Movie Database
    Tmdb,

    /// Internet Movie Database
    Imdb,
}

impl ExternalSource {
    pub const ALL: [ExternalSource; 2] = [Self::Tmdb, Self::Imdb];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tmdb => "tmdb",
            Self::Imdb => "imdb",
        }
    }
}

impl std::fmt::Display for ExternalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExternalSource {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tmdb" => Ok(Self::Tmdb),
            "imdb" => Ok(Self::Imdb),
            _ => Err(ParseTagError::UnknownSource(s.to_string())),
        }
    }
}

/// Kind of content a timeline item points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Feature film
    Movie,

    /// Single episode of a series
    Episode,
}

impl ContentKind {
    pub const ALL: [ContentKind; 2] = [Self::Movie, Self::Episode];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Episode => "episode",
        }
    }

    /// Whether a season number means anything for this kind
    pub fn is_series_like(&self) -> bool {
        matches!(self, Self::Episode)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "episode" => Ok(Self::Episode),
            _ => Err(ParseTagError::UnknownKind(s.to_string())),
        }
    }
}

/// Failure to map a declared tag onto a known source or kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTagError {
    #[error("unknown external source '{0}'")]
    UnknownSource(String),

    #[error("unsupported content kind '{0}'")]
    UnknownKind(String),
}

/// One declared point in a universe's chronology.
///
/// Equality and hashing use only the `(source, id, kind)` triple. Season and
/// title are carried for reporting and never consulted for matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItem {
    /// Identifier issued by the external catalog
    pub id: String,

    /// External catalog name (e.g. "tmdb")
    pub source: String,

    /// Content kind (e.g. "movie")
    #[serde(alias = "type")]
    pub kind: String,

    /// Season number, only meaningful for episodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,

    /// Human-readable label for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TimelineItem {
    pub fn new(id: impl Into<String>, source: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            kind: kind.into(),
            season: None,
            title: None,
        }
    }

    pub fn movie(source: ExternalSource, id: impl Into<String>) -> Self {
        Self::new(id, source.as_str(), ContentKind::Movie.as_str())
    }

    pub fn episode(source: ExternalSource, id: impl Into<String>, season: Option<u32>) -> Self {
        let mut item = Self::new(id, source.as_str(), ContentKind::Episode.as_str());
        item.season = season;
        item
    }

    pub fn with_season(mut self, season: u32) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// `source:id` label used in diagnostics
    pub fn reference(&self) -> String {
        format!("{}:{}", self.source.trim(), self.id.trim())
    }

    /// Names of required fields that are blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.trim().is_empty() {
            missing.push("id");
        }
        if self.source.trim().is_empty() {
            missing.push("source");
        }
        if self.kind.trim().is_empty() {
            missing.push("kind");
        }
        missing
    }

    pub fn is_structurally_valid(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn parsed_source(&self) -> Result<ExternalSource, ParseTagError> {
        self.source.parse()
    }

    pub fn parsed_kind(&self) -> Result<ContentKind, ParseTagError> {
        self.kind.parse()
    }
}

impl TimelineItem {
    /// Trimmed triple with tags case-folded, as the resolver compares it
    fn identity(&self) -> (String, &str, String) {
        (
            self.source.trim().to_ascii_lowercase(),
            self.id.trim(),
            self.kind.trim().to_ascii_lowercase(),
        )
    }
}

impl PartialEq for TimelineItem {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for TimelineItem {}

impl Hash for TimelineItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}
