use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

/// Type of content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TitleKind {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "tv")]
    Show,
}

impl TitleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleKind::Movie => "movie",
            TitleKind::Show => "tv",
        }
    }
}

impl Display for TitleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TitleKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(TitleKind::Movie),
            "tv" | "show" => Ok(TitleKind::Show),
            other => Err(AppError::DataAccess(format!("Unknown title type: {}", other))),
        }
    }
}

/// Catalog entry for a movie or TV show.
///
/// Titles are populated by the catalog import job; the feed only reads them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Title {
    /// Externally assigned identifier (the metadata provider's id)
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: TitleKind,
    pub name: String,
    pub year: Option<i32>,
    pub runtime_min: Option<i32>,
    pub poster_url: Option<String>,
    pub trailer_url: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub genres: Vec<String>,
    /// Mood tags, matched against a preference profile's moods
    #[serde(default)]
    pub vibes: Vec<String>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub adult: bool,
}

impl Title {
    /// Creates a title with no metadata beyond its identity
    pub fn new(id: i64, kind: TitleKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            year: None,
            runtime_min: None,
            poster_url: None,
            trailer_url: None,
            overview: String::new(),
            genres: Vec::new(),
            vibes: Vec::new(),
            popularity: 0.0,
            rating: 0.0,
            adult: false,
        }
    }

    pub fn with_genres(mut self, genres: &[&str]) -> Self {
        self.genres = genres.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn with_vibes(mut self, vibes: &[&str]) -> Self {
        self.vibes = vibes.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity;
        self
    }

    pub fn with_runtime(mut self, runtime_min: i32) -> Self {
        self.runtime_min = Some(runtime_min);
        self
    }
}

/// A title decorated with per-request ranking data. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedItem {
    #[serde(flatten)]
    pub title: Title,
    pub priority_score: f64,
    /// Number of other group members who swiped yes on this title
    pub group_interest: u32,
}

impl FeedItem {
    pub fn id(&self) -> i64 {
        self.title.id
    }
}
