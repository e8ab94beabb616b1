//! Study material generation on top of the Gemini client.
//!
//! Four operations: text extraction from an image, summary, quiz and
//! flashcards. The last two use a JSON response schema; output that is empty or
//! fails to parse degrades to [`Generated::Degraded`] instead of failing the
//! session.

use crate::config::StudyConfig;
use crate::gemini::{GeminiClient, GenerateContentRequest, GenerationError, Part};
use crate::schema::{ExtractedText, Flashcard, Generated, QuizQuestion, UploadedDocument};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

/// Backend that turns a document into study materials.
#[async_trait::async_trait]
pub trait StudyGenerator: Send + Sync {
    async fn extract_text(&self, document: &UploadedDocument) -> Result<ExtractedText, GenerationError>;
    async fn generate_summary(&self, text: &ExtractedText) -> Result<String, GenerationError>;
    async fn generate_quiz(&self, text: &ExtractedText) -> Result<Generated<QuizQuestion>, GenerationError>;
    async fn generate_flashcards(&self, text: &ExtractedText) -> Result<Generated<Flashcard>, GenerationError>;
}

/// [`StudyGenerator`] backed by Gemini.
pub struct GeminiStudyGenerator {
    client: GeminiClient,
    config: StudyConfig,
}

impl GeminiStudyGenerator {
    pub fn new(client: GeminiClient, config: StudyConfig) -> Self {
        Self { client, config }
    }

    fn quiz_prompt(&self, text: &ExtractedText) -> String {
        format!(
            "Based on the following text, create a multiple-choice quiz with {} questions to test understanding. \
             Provide the question, {} options, and the correct answer. Text: \"\"\"{}\"\"\"",
            self.config.quiz_questions,
            self.config.quiz_options,
            text.as_str()
        )
    }

    fn flashcards_prompt(&self, text: &ExtractedText) -> String {
        format!(
            "Based on the following text, generate {} flashcards with a key 'term' and a 'definition'. \
             The term should be a concept or keyword, and the definition should be a concise explanation. \
             Text: \"\"\"{}\"\"\"",
            self.config.flashcards,
            text.as_str()
        )
    }
}

#[async_trait::async_trait]
impl StudyGenerator for GeminiStudyGenerator {
    async fn extract_text(&self, document: &UploadedDocument) -> Result<ExtractedText, GenerationError> {
        info!(
            "Extracting text from {} ({}, {} bytes)",
            document.filename,
            document.media_type,
            document.data.len()
        );

        let request = GenerateContentRequest::user(vec![
            Part::inline_data(&document.media_type, &document.data),
            Part::text(&self.config.extraction_prompt),
        ]);

        let text = self.client.generate(&request).await?;
        debug!("Extracted {} chars", text.len());
        Ok(ExtractedText::new(text))
    }

    async fn generate_summary(&self, text: &ExtractedText) -> Result<String, GenerationError> {
        let prompt = format!(
            "{} Text: \"\"\"{}\"\"\"",
            self.config.summary_prompt,
            text.as_str()
        );
        let request = GenerateContentRequest::user(vec![Part::text(prompt)])
            .with_system_instruction(&self.config.summary_system_instruction);

        self.client.generate(&request).await
    }

    async fn generate_quiz(&self, text: &ExtractedText) -> Result<Generated<QuizQuestion>, GenerationError> {
        let request = GenerateContentRequest::user(vec![Part::text(self.quiz_prompt(text))])
            .with_json_schema(quiz_schema());

        let quiz = structured::<QuizQuestion>(self.client.generate(&request).await, "quiz")?;

        for (index, question) in quiz.items().iter().enumerate() {
            if !question.answer_in_options() {
                warn!(
                    "Quiz question {} has a correct answer that is not among its options",
                    index
                );
            }
        }

        Ok(quiz)
    }

    async fn generate_flashcards(&self, text: &ExtractedText) -> Result<Generated<Flashcard>, GenerationError> {
        let request = GenerateContentRequest::user(vec![Part::text(self.flashcards_prompt(text))])
            .with_json_schema(flashcards_schema());

        structured::<Flashcard>(self.client.generate(&request).await, "flashcards")
    }
}

// ============================================================================
// Response schemas
// ============================================================================

pub fn quiz_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING" },
                "options": { "type": "ARRAY", "items": { "type": "STRING" } },
                "correctAnswer": { "type": "STRING" }
            },
            "required": ["question", "options", "correctAnswer"]
        }
    })
}

pub fn flashcards_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "term": { "type": "STRING" },
                "definition": { "type": "STRING" }
            },
            "required": ["term", "definition"]
        }
    })
}

// ============================================================================
// Parsing
// ============================================================================

/// Structured output from a generation call. An empty reply (blank text or a
/// safety-blocked candidate) degrades like unparseable JSON; transport and API
/// errors still fail.
fn structured<T: DeserializeOwned>(
    response: Result<String, GenerationError>,
    what: &str,
) -> Result<Generated<T>, GenerationError> {
    match response {
        Ok(text) => Ok(parse_generated(&text, what)),
        Err(GenerationError::EmptyResponse) => {
            warn!("Gemini returned an empty {} response", what);
            Ok(Generated::Degraded {
                reason: format!("Gemini returned no {}", what),
            })
        }
        Err(e) => Err(e),
    }
}

/// Parse a JSON array response, degrading instead of failing.
fn parse_generated<T: DeserializeOwned>(response: &str, what: &str) -> Generated<T> {
    match serde_json::from_str::<Vec<T>>(strip_code_fence(response)) {
        Ok(items) => {
            info!("Parsed {} {} items", items.len(), what);
            Generated::Items { items }
        }
        Err(e) => {
            warn!(
                "Failed to parse {} JSON: {} (response starts with {:?})",
                what,
                e,
                response.chars().take(200).collect::<String>()
            );
            Generated::Degraded {
                reason: format!("Could not parse generated {}: {}", what, e),
            }
        }
    }
}

/// Strip a markdown code block wrapping the whole response. Backticks inside
/// the JSON itself are left alone.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
