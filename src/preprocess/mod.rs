
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

/// Line comments run to the end of the line (the newline is kept), block
/// comments are matched lazily and may span lines. String literals are not
/// parsed, so a `//` inside a string starts a comment.
static COMMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[^\n]*|/\*[\s\S]*?\*/").expect("valid regex"));

/// Coarse label inferred from a source file's path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    EventSystem,
    PlayerMovement,
    CollisionSystem,
    General,
}

impl Category {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventSystem => "event_system",
            Self::PlayerMovement => "player_movement",
            Self::CollisionSystem => "collision_system",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Category {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source file after comment stripping and classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDocument {
    pub cleaned: String,
    pub category: Category,
}

impl PreparedDocument {
    /// Text sent to the embedding provider, optionally tagged with the category
    #[inline]
    pub fn embedding_text(&self, tag_category: bool) -> String {
        if tag_category {
            embedding_text(&self.cleaned, self.category)
        } else {
            self.cleaned.clone()
        }
    }
}

/// Remove `//` and `/* */` comments from source text
#[inline]
pub fn strip_comments(source: &str) -> String {
    COMMENT_REGEX.replace_all(source, "").into_owned()
}

/// Classify a file by substrings of its path. The first matching rule wins.
#[inline]
pub fn classify(path: &Path) -> Category {
    let path = path.to_string_lossy();
    let lowered = path.to_lowercase();

    if path.contains("EventManager") || lowered.contains("event") {
        Category::EventSystem
    } else if path.contains("Player") || lowered.contains("movement") {
        Category::PlayerMovement
    } else if lowered.contains("collision") {
        Category::CollisionSystem
    } else {
        Category::General
    }
}

#[inline]
pub fn embedding_text(cleaned: &str, category: Category) -> String {
    format!("[Category: {}] {}", category, cleaned)
}

#[inline]
pub fn prepare(content: &str, path: &Path) -> PreparedDocument {
    PreparedDocument {
        cleaned: strip_comments(content),
        category: classify(path),
    }
}
