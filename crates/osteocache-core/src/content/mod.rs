//! Study content loaded through the offline cache.
//!
//! Each category has one JSON dataset: an array of objects carrying at least
//! an integer `id`. Everything else about an item is opaque here except for
//! quizzes, which get a typed [`Quiz`] view for answer checking.

pub mod library;
pub mod quiz;

pub use library::{ContentItem, ContentLibrary};
pub use quiz::{Quiz, QuizAttempt, QuizResult};

use thiserror::Error;

use crate::offline::CacheError;
use crate::progress::{Category, ItemId, ProgressError};

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Failed to load {category} dataset: {source}")]
    Unavailable {
        category: Category,
        #[source]
        source: CacheError,
    },

    #[error("Unexpected status {status} loading {category} dataset")]
    BadStatus { category: Category, status: u16 },

    #[error("Failed to parse {category} dataset: {source}")]
    Parse {
        category: Category,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate id {id} in {category} dataset")]
    DuplicateId { category: Category, id: ItemId },

    #[error("Quiz {id} is malformed: {reason}")]
    InvalidQuiz { id: ItemId, reason: String },

    #[error("Answer {index} is out of range for quiz {id}")]
    AnswerOutOfRange { id: ItemId, index: usize },

    #[error(transparent)]
    Progress(#[from] ProgressError),
}
