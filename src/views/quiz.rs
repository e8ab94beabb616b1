//! Multiple-choice quiz interaction state.

use super::InteractionError;
use crate::schema::QuizQuestion;
use serde::Serialize;
use std::collections::BTreeMap;

/// How an option should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionStatus {
    Neutral,
    Selected,
    /// Chosen and correct.
    Correct,
    /// Chosen and wrong.
    Incorrect,
    /// Correct but not chosen.
    Missed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizState {
    answers: BTreeMap<usize, String>,
    score: Option<usize>,
}

impl QuizState {
    pub fn answer(&self, question: usize) -> Option<&str> {
        self.answers.get(&question).map(String::as_str)
    }

    pub fn is_submitted(&self) -> bool {
        self.score.is_some()
    }

    pub fn score(&self) -> Option<usize> {
        self.score
    }

    pub fn select(
        &mut self,
        questions: &[QuizQuestion],
        question: usize,
        option: &str,
    ) -> Result<(), InteractionError> {
        if self.is_submitted() {
            return Err(InteractionError::QuizSubmitted);
        }
        let q = questions
            .get(question)
            .ok_or(InteractionError::QuestionOutOfRange {
                index: question,
                count: questions.len(),
            })?;
        if !q.options.iter().any(|o| o == option) {
            return Err(InteractionError::UnknownOption(option.to_string()));
        }
        self.answers.insert(question, option.to_string());
        Ok(())
    }

    /// Score by exact match against each correct answer and freeze answers.
    pub fn submit(&mut self, questions: &[QuizQuestion]) -> Result<usize, InteractionError> {
        if questions.is_empty() {
            return Err(InteractionError::NoQuestions);
        }
        if let Some(score) = self.score {
            return Ok(score);
        }
        let score = questions
            .iter()
            .enumerate()
            .filter(|(i, q)| self.answer(*i) == Some(q.correct_answer.as_str()))
            .count();
        self.score = Some(score);
        Ok(score)
    }

    pub fn reset(&mut self) {
        self.answers.clear();
        self.score = None;
    }

    pub fn option_status(&self, question: &QuizQuestion, index: usize, option: &str) -> OptionStatus {
        let selected = self.answer(index) == Some(option);
        if !self.is_submitted() {
            return if selected {
                OptionStatus::Selected
            } else {
                OptionStatus::Neutral
            };
        }
        let correct = option == question.correct_answer;
        match (selected, correct) {
            (true, true) => OptionStatus::Correct,
            (true, false) => OptionStatus::Incorrect,
            (false, true) => OptionStatus::Missed,
            (false, false) => OptionStatus::Neutral,
        }
    }
}
