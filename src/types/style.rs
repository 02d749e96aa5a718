//! Generation style parameters.

use serde::{Deserialize, Serialize};

/// How a continuation should read: genre, voice and reading level.
///
/// Part of every cache key. Two requests that differ only in style are
/// different narrative states and never share a cached continuation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleParams {
    /// Story genre (e.g. "Fantasy", "Mystery").
    pub genre: String,
    /// Author whose style the prose should imitate.
    pub author_style: String,
    /// Target reading level (e.g. "Early Reader", "Middle Grade").
    pub reading_level: String,
}

impl StyleParams {
    pub fn new(
        genre: impl Into<String>,
        author_style: impl Into<String>,
        reading_level: impl Into<String>,
    ) -> Self {
        Self {
            genre: genre.into(),
            author_style: author_style.into(),
            reading_level: reading_level.into(),
        }
    }

    /// Set the genre.
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    /// Set the author style.
    pub fn author_style(mut self, author_style: impl Into<String>) -> Self {
        self.author_style = author_style.into();
        self
    }

    /// Set the reading level.
    pub fn reading_level(mut self, reading_level: impl Into<String>) -> Self {
        self.reading_level = reading_level.into();
        self
    }
}
