//! Study views and the router that picks one for the active mode.
//!
//! Rendering is a pure function of the mode, the session result and the
//! active view's interaction state. Only the quiz and flashcard views carry
//! interaction state; summary and full text are plain strings.

pub mod flashcards;
pub mod quiz;

use crate::schema::{Generated, SessionResult, StudyMode};
use flashcards::FlashcardState;
use quiz::{OptionStatus, QuizState};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("quiz has already been submitted")]
    QuizSubmitted,
    #[error("question {index} out of range ({count} questions)")]
    QuestionOutOfRange { index: usize, count: usize },
    #[error("option {0:?} is not one of the question's options")]
    UnknownOption(String),
    #[error("no quiz questions were generated")]
    NoQuestions,
    #[error("no flashcards were generated")]
    NoFlashcards,
    #[error("the {0:?} view is not active")]
    WrongMode(StudyMode),
}

/// Interaction state of the active view. Replaced whenever the mode changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    None,
    Quiz(QuizState),
    Flashcards(FlashcardState),
}

impl Interaction {
    pub fn for_mode(mode: StudyMode) -> Self {
        match mode {
            StudyMode::Quiz => Interaction::Quiz(QuizState::default()),
            StudyMode::Flashcards => Interaction::Flashcards(FlashcardState::default()),
            StudyMode::Summary | StudyMode::FullText => Interaction::None,
        }
    }
}

/// A rendered view, ready to be serialized for the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum View {
    /// Shown while no study session is ready.
    Placeholder { message: String },
    Summary { text: String },
    Quiz(QuizView),
    Flashcards(FlashcardsView),
    FullText { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizView {
    pub questions: Vec<QuestionView>,
    pub submitted: bool,
    pub score: Option<usize>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub question: String,
    pub options: Vec<OptionView>,
    pub answer: Option<String>,
    /// Only revealed after submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub text: String,
    pub status: OptionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardsView {
    pub card: Option<CardView>,
    pub index: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub term: String,
    pub definition: String,
    pub flipped: bool,
}

/// Select and render the view for `mode`.
pub fn render(mode: StudyMode, result: &SessionResult, interaction: &Interaction) -> View {
    match mode {
        StudyMode::Summary => View::Summary {
            text: result.summary.clone(),
        },
        StudyMode::FullText => View::FullText {
            text: result.extracted_text.as_str().to_string(),
        },
        StudyMode::Quiz => {
            let fresh = QuizState::default();
            let state = match interaction {
                Interaction::Quiz(state) => state,
                _ => &fresh,
            };
            View::Quiz(render_quiz(&result.quiz, state))
        }
        StudyMode::Flashcards => {
            let fresh = FlashcardState::default();
            let state = match interaction {
                Interaction::Flashcards(state) => state,
                _ => &fresh,
            };
            View::Flashcards(render_flashcards(result, state))
        }
    }
}

fn render_quiz(quiz: &Generated<crate::schema::QuizQuestion>, state: &QuizState) -> QuizView {
    let questions = quiz
        .items()
        .iter()
        .enumerate()
        .map(|(index, q)| QuestionView {
            question: q.question.clone(),
            options: q
                .options
                .iter()
                .map(|option| OptionView {
                    text: option.clone(),
                    status: state.option_status(q, index, option),
                })
                .collect(),
            answer: state.answer(index).map(str::to_string),
            correct_answer: state.is_submitted().then(|| q.correct_answer.clone()),
        })
        .collect::<Vec<_>>();

    QuizView {
        total: questions.len(),
        questions,
        submitted: state.is_submitted(),
        score: state.score(),
        empty_message: empty_message(quiz, "No quiz questions were generated."),
    }
}

fn render_flashcards(result: &SessionResult, state: &FlashcardState) -> FlashcardsView {
    let cards = result.flashcards.items();
    FlashcardsView {
        card: cards.get(state.index()).map(|c| CardView {
            term: c.term.clone(),
            definition: c.definition.clone(),
            flipped: state.is_flipped(),
        }),
        index: state.index(),
        total: cards.len(),
        empty_message: empty_message(&result.flashcards, "No flashcards were generated."),
    }
}

fn empty_message<T>(generated: &Generated<T>, message: &str) -> Option<String> {
    if !generated.is_empty() {
        return None;
    }
    Some(match generated.degraded_reason() {
        Some(reason) => format!("{} {}", message, reason),
        None => message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExtractedText, Flashcard, QuizQuestion};

    fn result() -> SessionResult {
        SessionResult {
            extracted_text: ExtractedText::new("Line one\n\n  Line two"),
            summary: "A short summary.".into(),
            quiz: vec![QuizQuestion {
                question: "Which?".into(),
                options: vec!["x".into(), "y".into(), "z".into(), "w".into()],
                correct_answer: "y".into(),
            }]
            .into(),
            flashcards: vec![
                Flashcard {
                    term: "Osmosis".into(),
                    definition: "Diffusion of water".into(),
                },
                Flashcard {
                    term: "Mitosis".into(),
                    definition: "Cell division".into(),
                },
            ]
            .into(),
        }
    }

    #[test]
    fn test_each_mode_routes_to_its_view() {
        let result = result();
        assert!(matches!(
            render(StudyMode::Summary, &result, &Interaction::None),
            View::Summary { text } if text == "A short summary."
        ));
        assert!(matches!(
            render(StudyMode::FullText, &result, &Interaction::None),
            View::FullText { text } if text == "Line one\n\n  Line two"
        ));
        assert!(matches!(
            render(StudyMode::Quiz, &result, &Interaction::for_mode(StudyMode::Quiz)),
            View::Quiz(QuizView { total: 1, .. })
        ));
        assert!(matches!(
            render(StudyMode::Flashcards, &result, &Interaction::for_mode(StudyMode::Flashcards)),
            View::Flashcards(FlashcardsView { total: 2, .. })
        ));
    }

    #[test]
    fn test_quiz_reveals_after_submit() {
        let result = result();
        let mut state = QuizState::default();
        state.select(result.quiz.items(), 0, "x").unwrap();

        let View::Quiz(before) = render(StudyMode::Quiz, &result, &Interaction::Quiz(state.clone()))
        else {
            panic!("expected quiz view");
        };
        assert_eq!(before.questions[0].correct_answer, None);
        assert_eq!(before.questions[0].options[0].status, OptionStatus::Selected);

        state.submit(result.quiz.items()).unwrap();
        let View::Quiz(after) = render(StudyMode::Quiz, &result, &Interaction::Quiz(state)) else {
            panic!("expected quiz view");
        };
        assert_eq!(after.score, Some(0));
        assert_eq!(after.questions[0].correct_answer.as_deref(), Some("y"));
        assert_eq!(after.questions[0].options[0].status, OptionStatus::Incorrect);
        assert_eq!(after.questions[0].options[1].status, OptionStatus::Missed);
    }

    #[test]
    fn test_flashcard_view_tracks_state() {
        let result = result();
        let mut state = FlashcardState::default();
        state.advance(2, flashcards::Direction::Next).unwrap();
        state.flip(2).unwrap();

        let View::Flashcards(view) =
            render(StudyMode::Flashcards, &result, &Interaction::Flashcards(state))
        else {
            panic!("expected flashcards view");
        };
        let card = view.card.unwrap();
        assert_eq!(card.term, "Mitosis");
        assert!(card.flipped);
        assert_eq!(view.index, 1);
    }

    #[test]
    fn test_degraded_outputs_render_messages() {
        let mut result = result();
        result.quiz = Generated::Degraded {
            reason: "Could not parse generated quiz: EOF".into(),
        };
        result.flashcards = Vec::new().into();

        let View::Quiz(quiz) = render(StudyMode::Quiz, &result, &Interaction::None) else {
            panic!("expected quiz view");
        };
        assert_eq!(
            quiz.empty_message.as_deref(),
            Some("No quiz questions were generated. Could not parse generated quiz: EOF")
        );

        let View::Flashcards(cards) = render(StudyMode::Flashcards, &result, &Interaction::None)
        else {
            panic!("expected flashcards view");
        };
        assert_eq!(cards.card, None);
        assert_eq!(cards.empty_message.as_deref(), Some("No flashcards were generated."));
    }

    #[test]
    fn test_view_wire_format() {
        let value = serde_json::to_value(View::FullText { text: "t".into() }).unwrap();
        assert_eq!(value, serde_json::json!({"view": "fullText", "text": "t"}));
    }
}
