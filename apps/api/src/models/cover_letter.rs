use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::member::UnknownVariant;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoverLetterRow {
    pub cover_letter_id: i64,
    pub member_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoverLetterQnaRow {
    pub cover_letter_qna_id: i64,
    pub cover_letter_id: i64,
    pub position: i32,
    pub question: String,
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureCategory {
    Structure,
    Content,
    Expression,
}

impl FeatureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureCategory::Structure => "STRUCTURE",
            FeatureCategory::Content => "CONTENT",
            FeatureCategory::Expression => "EXPRESSION",
        }
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureCategory {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STRUCTURE" => Ok(FeatureCategory::Structure),
            "CONTENT" => Ok(FeatureCategory::Content),
            "EXPRESSION" => Ok(FeatureCategory::Expression),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A writing heuristic fed to the LLM as evaluation context.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoverLetterFeatureRow {
    pub cover_letter_feature_id: i64,
    pub category: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
