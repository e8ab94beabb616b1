//! Study session lifecycle.
//!
//! A session moves `Idle -> Extracting -> Generating -> Ready | Failed` and
//! only returns to `Idle` through an explicit reset. Study mode and view
//! interaction state exist only inside `Ready`.

use crate::gemini::GenerationError;
use crate::generation::StudyGenerator;
use crate::schema::{DocumentInfo, SessionResult, StudyMode, UploadedDocument};
use crate::views::flashcards::Direction;
use crate::views::{self, Interaction, InteractionError, View};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const EXTRACTING_MESSAGE: &str = "Extracting text from document...";
pub const GENERATING_MESSAGE: &str = "Generating study materials...";
const IDLE_MESSAGE: &str = "Upload a document image to get started.";

pub type SessionHandle = Arc<RwLock<Session>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Extracting,
    Generating,
    Ready,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Extracting => "extracting",
            Phase::Generating => "generating",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("cannot {action} while the session is {phase}")]
pub struct TransitionError {
    pub action: &'static str,
    pub phase: Phase,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
}

#[derive(Debug)]
pub enum SessionState {
    Idle,
    Extracting,
    Generating,
    Ready(ReadyState),
    Failed { message: String },
}

#[derive(Debug)]
pub struct ReadyState {
    result: SessionResult,
    mode: StudyMode,
    interaction: Interaction,
}

impl ReadyState {
    fn new(result: SessionResult) -> Self {
        let mode = StudyMode::default();
        Self {
            result,
            mode,
            interaction: Interaction::for_mode(mode),
        }
    }
}

/// Serializable view of a session for polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub phase: Phase,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<StudyMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentInfo>,
}

#[derive(Debug)]
pub struct Session {
    id: String,
    state: SessionState,
    document: Option<DocumentInfo>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: format!("ses_{}", Uuid::new_v4().simple()),
            state: SessionState::Idle,
            document: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Idle => Phase::Idle,
            SessionState::Extracting => Phase::Extracting,
            SessionState::Generating => Phase::Generating,
            SessionState::Ready(_) => Phase::Ready,
            SessionState::Failed { .. } => Phase::Failed,
        }
    }

    pub fn loading_message(&self) -> Option<&'static str> {
        match self.state {
            SessionState::Extracting => Some(EXTRACTING_MESSAGE),
            SessionState::Generating => Some(GENERATING_MESSAGE),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SessionState::Failed { message } => Some(message),
            _ => None,
        }
    }

    /// Current study mode, if the session is ready.
    pub fn mode(&self) -> Option<StudyMode> {
        match &self.state {
            SessionState::Ready(ready) => Some(ready.mode),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            phase: self.phase(),
            loading: self.loading_message().is_some(),
            loading_message: self.loading_message(),
            error: self.error().map(str::to_string),
            mode: self.mode(),
            document: self.document.clone(),
        }
    }

    fn invalid(&self, action: &'static str) -> TransitionError {
        TransitionError {
            action,
            phase: self.phase(),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle transitions
    // ------------------------------------------------------------------------

    pub fn begin_upload(&mut self, document: DocumentInfo) -> Result<(), TransitionError> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::Extracting;
                self.document = Some(document);
                Ok(())
            }
            _ => Err(self.invalid("upload a document")),
        }
    }

    pub fn extraction_succeeded(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SessionState::Extracting => {
                self.state = SessionState::Generating;
                Ok(())
            }
            _ => Err(self.invalid("finish extraction")),
        }
    }

    pub fn generation_succeeded(&mut self, result: SessionResult) -> Result<(), TransitionError> {
        match self.state {
            SessionState::Generating => {
                self.state = SessionState::Ready(ReadyState::new(result));
                Ok(())
            }
            _ => Err(self.invalid("finish generation")),
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        match self.state {
            SessionState::Extracting | SessionState::Generating => {
                self.state = SessionState::Failed {
                    message: message.into(),
                };
                Ok(())
            }
            _ => Err(self.invalid("record a failure")),
        }
    }

    /// Discard everything and start over.
    pub fn reset(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SessionState::Ready(_) | SessionState::Failed { .. } => {
                self.state = SessionState::Idle;
                self.document = None;
                Ok(())
            }
            _ => Err(self.invalid("reset")),
        }
    }

    /// Switch views. Switching to a different mode drops the old view's state.
    pub fn set_mode(&mut self, mode: StudyMode) -> Result<(), TransitionError> {
        let ready = self.ready_mut("change study mode")?;
        if ready.mode != mode {
            ready.mode = mode;
            ready.interaction = Interaction::for_mode(mode);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    pub fn render(&self) -> View {
        match &self.state {
            SessionState::Ready(ready) => views::render(ready.mode, &ready.result, &ready.interaction),
            SessionState::Failed { message } => View::Placeholder {
                message: message.clone(),
            },
            SessionState::Idle => View::Placeholder {
                message: IDLE_MESSAGE.to_string(),
            },
            SessionState::Extracting | SessionState::Generating => View::Placeholder {
                message: self.loading_message().unwrap_or_default().to_string(),
            },
        }
    }

    fn ready_mut(&mut self, action: &'static str) -> Result<&mut ReadyState, TransitionError> {
        let phase = self.phase();
        match &mut self.state {
            SessionState::Ready(ready) => Ok(ready),
            _ => Err(TransitionError { action, phase }),
        }
    }

    pub fn quiz_select(&mut self, question: usize, option: &str) -> Result<(), SessionError> {
        let ready = self.ready_mut("answer the quiz")?;
        match &mut ready.interaction {
            Interaction::Quiz(state) => Ok(state.select(ready.result.quiz.items(), question, option)?),
            _ => Err(InteractionError::WrongMode(StudyMode::Quiz).into()),
        }
    }

    pub fn quiz_submit(&mut self) -> Result<usize, SessionError> {
        let ready = self.ready_mut("submit the quiz")?;
        match &mut ready.interaction {
            Interaction::Quiz(state) => Ok(state.submit(ready.result.quiz.items())?),
            _ => Err(InteractionError::WrongMode(StudyMode::Quiz).into()),
        }
    }

    pub fn quiz_reset(&mut self) -> Result<(), SessionError> {
        let ready = self.ready_mut("reset the quiz")?;
        match &mut ready.interaction {
            Interaction::Quiz(state) => {
                state.reset();
                Ok(())
            }
            _ => Err(InteractionError::WrongMode(StudyMode::Quiz).into()),
        }
    }

    pub fn flashcard_flip(&mut self) -> Result<bool, SessionError> {
        let ready = self.ready_mut("flip a flashcard")?;
        let count = ready.result.flashcards.len();
        match &mut ready.interaction {
            Interaction::Flashcards(state) => Ok(state.flip(count)?),
            _ => Err(InteractionError::WrongMode(StudyMode::Flashcards).into()),
        }
    }

    /// First half of a navigation: turn the current card face up.
    pub fn flashcard_unflip(&mut self) -> Result<(), SessionError> {
        let ready = self.ready_mut("navigate flashcards")?;
        if ready.result.flashcards.is_empty() {
            return Err(InteractionError::NoFlashcards.into());
        }
        match &mut ready.interaction {
            Interaction::Flashcards(state) => {
                state.unflip();
                Ok(())
            }
            _ => Err(InteractionError::WrongMode(StudyMode::Flashcards).into()),
        }
    }

    /// Second half of a navigation: move to the neighbouring card.
    pub fn flashcard_advance(&mut self, direction: Direction) -> Result<usize, SessionError> {
        let ready = self.ready_mut("navigate flashcards")?;
        let count = ready.result.flashcards.len();
        match &mut ready.interaction {
            Interaction::Flashcards(state) => Ok(state.advance(count, direction)?),
            _ => Err(InteractionError::WrongMode(StudyMode::Flashcards).into()),
        }
    }
}

// ============================================================================
// Processing pipeline
// ============================================================================

/// Run extraction and generation for a session already in `Extracting`,
/// then record the outcome.
pub async fn process_document(
    session: SessionHandle,
    generator: Arc<dyn StudyGenerator>,
    document: UploadedDocument,
) {
    let started = Instant::now();
    let outcome = run_pipeline(&session, generator.as_ref(), document).await;

    let mut session = session.write().unwrap();
    let recorded = match outcome {
        Ok(result) => {
            info!(
                "Session {} ready in {:.1}s: {} chars, {} quiz questions, {} flashcards",
                session.id(),
                started.elapsed().as_secs_f64(),
                result.extracted_text.as_str().len(),
                result.quiz.len(),
                result.flashcards.len()
            );
            session.generation_succeeded(result)
        }
        Err(e) => {
            error!("Session {} failed: {}", session.id(), e);
            session.fail(e.to_string())
        }
    };

    if let Err(e) = recorded {
        warn!("Session {} outcome discarded: {}", session.id(), e);
    }
}

async fn run_pipeline(
    session: &SessionHandle,
    generator: &dyn StudyGenerator,
    document: UploadedDocument,
) -> Result<SessionResult, GenerationError> {
    let text = generator.extract_text(&document).await?;
    drop(document);

    let transitioned = session.write().unwrap().extraction_succeeded();
    if let Err(e) = transitioned {
        warn!("Unexpected session state after extraction: {}", e);
    }

    // Fail fast: the first error wins and the other calls are dropped.
    let (summary, quiz, flashcards) = tokio::try_join!(
        generator.generate_summary(&text),
        generator.generate_quiz(&text),
        generator.generate_flashcards(&text),
    )?;

    Ok(SessionResult {
        extracted_text: text,
        summary,
        quiz,
        flashcards,
    })
}
