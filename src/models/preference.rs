use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's taste profile within one group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preference {
    pub user_id: Uuid,
    pub group_id: Uuid,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub moods: Vec<String>,
    /// Streaming services the user subscribes to
    #[serde(default)]
    pub services: Vec<String>,
    /// Longest runtime the user is willing to sit through
    #[serde(default)]
    pub max_runtime_min: Option<i32>,
}

impl Preference {
    /// Creates an empty profile
    pub fn new(user_id: Uuid, group_id: Uuid) -> Self {
        Self {
            user_id,
            group_id,
            genres: Vec::new(),
            moods: Vec::new(),
            services: Vec::new(),
            max_runtime_min: None,
        }
    }

    /// Counts the candidate genres present in this profile
    pub fn genre_matches(&self, genres: &[String]) -> usize {
        genres.iter().filter(|g| self.genres.contains(g)).count()
    }

    /// Counts the candidate vibes present in this profile's moods
    pub fn mood_matches(&self, vibes: &[String]) -> usize {
        vibes.iter().filter(|v| self.moods.contains(v)).count()
    }

    /// Runtime cap to push down into the title query. Zero or negative
    /// values mean "no cap".
    pub fn runtime_cap(&self) -> Option<i32> {
        self.max_runtime_min.filter(|m| *m > 0)
    }
}
