use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::library::ContentItem;
use super::ContentError;
use crate::progress::{Category, ItemId, ProgressStore};
use crate::storage::KeyValueStore;

/// Typed view of an entry in the quizzes dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Quiz {
    pub id: ItemId,
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct: usize,
    #[serde(default)]
    pub explanation: String,
}

impl Quiz {
    pub fn from_item(item: &ContentItem) -> Result<Self, ContentError> {
        let mut object = item.fields.clone();
        object.insert("id".to_string(), Value::from(item.id));
        let quiz: Quiz = serde_json::from_value(Value::Object(object)).map_err(|e| {
            ContentError::InvalidQuiz {
                id: item.id,
                reason: e.to_string(),
            }
        })?;
        if quiz.correct >= quiz.options.len() {
            return Err(ContentError::InvalidQuiz {
                id: quiz.id,
                reason: format!(
                    "correct answer {} but only {} options",
                    quiz.correct,
                    quiz.options.len()
                ),
            });
        }
        Ok(quiz)
    }

    pub fn is_correct(&self, answer: usize) -> bool {
        answer == self.correct
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizResult {
    pub is_correct: bool,
    pub selected: usize,
    pub correct: usize,
    pub explanation: String,
}

/// One pass at a quiz: pick an answer, then check it once.
#[derive(Debug, Clone)]
pub struct QuizAttempt {
    quiz: Quiz,
    answer: Option<usize>,
    result: Option<QuizResult>,
}

impl QuizAttempt {
    pub fn new(quiz: Quiz) -> Self {
        Self {
            quiz,
            answer: None,
            result: None,
        }
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn answer(&self) -> Option<usize> {
        self.answer
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    /// Select an answer. Returns `false` once the attempt has been checked;
    /// the answer is locked from then on.
    pub fn select(&mut self, index: usize) -> Result<bool, ContentError> {
        if self.result.is_some() {
            return Ok(false);
        }
        if index >= self.quiz.options.len() {
            return Err(ContentError::AnswerOutOfRange {
                id: self.quiz.id,
                index,
            });
        }
        self.answer = Some(index);
        Ok(true)
    }

    /// Check the selected answer. A correct answer marks the quiz complete.
    ///
    /// Returns `None` if nothing is selected. Checking again returns the first
    /// result without touching progress.
    pub fn check<S: KeyValueStore>(
        &mut self,
        progress: &mut ProgressStore<S>,
    ) -> Result<Option<&QuizResult>, ContentError> {
        if self.result.is_none() {
            let Some(selected) = self.answer else {
                return Ok(None);
            };
            let is_correct = self.quiz.is_correct(selected);
            if is_correct {
                progress.mark_complete(Category::Quizzes, self.quiz.id)?;
            }
            info!(quiz = self.quiz.id, correct = is_correct, "Quiz answered");
            self.result = Some(QuizResult {
                is_correct,
                selected,
                correct: self.quiz.correct,
                explanation: self.quiz.explanation.clone(),
            });
        }
        Ok(self.result.as_ref())
    }
}
