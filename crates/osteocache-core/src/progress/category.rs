use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ProgressError;

/// Identifier of a study item, unique within its category's dataset.
pub type ItemId = i64;

/// The four content domains. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Anatomy,
    Techniques,
    Cases,
    Quizzes,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Anatomy,
        Category::Techniques,
        Category::Cases,
        Category::Quizzes,
    ];

    /// Wire name used in the persisted snapshot and dataset paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Anatomy => "anatomy",
            Category::Techniques => "techniques",
            Category::Cases => "cases",
            Category::Quizzes => "quizzes",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Anatomy => "Anatomy",
            Category::Techniques => "Techniques",
            Category::Cases => "Clinical Cases",
            Category::Quizzes => "Quizzes",
        }
    }

    /// Path of the content dataset for this category, relative to the origin.
    pub fn dataset_path(&self) -> &'static str {
        match self {
            Category::Anatomy => "/data/anatomy.json",
            Category::Techniques => "/data/techniques.json",
            Category::Cases => "/data/cases.json",
            Category::Quizzes => "/data/quizzes.json",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anatomy" => Ok(Category::Anatomy),
            "techniques" => Ok(Category::Techniques),
            "cases" => Ok(Category::Cases),
            "quizzes" => Ok(Category::Quizzes),
            _ => Err(ProgressError::UnknownCategory(s.to_string())),
        }
    }
}
