//! Query composition from typed and dictated text.

use crate::backend::SearchRequest;
use crate::config::DEFAULT_SEARCH_LIMIT;
use async_trait::async_trait;
use thiserror::Error;

/// Smallest accepted result limit.
pub const MIN_LIMIT: u32 = 1;
/// Largest accepted result limit.
pub const MAX_LIMIT: u32 = 20;

/// Validation errors raised while building a search request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    /// The query is empty after trimming.
    #[error("search query is empty")]
    EmptyQuery,
}

/// Errors reported by a speech transcriber.
#[derive(Debug, Error)]
pub enum TranscriberError {
    /// Capture could not be started.
    #[error("failed to start transcription: {0}")]
    Start(String),
    /// Capture could not be stopped.
    #[error("failed to stop transcription: {0}")]
    Stop(String),
}

/// One recognized fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSegment {
    /// Recognized text.
    pub text: String,
    /// Whether the recognizer committed to this text.
    pub is_final: bool,
}

impl TranscriptSegment {
    /// Committed fragment.
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    /// Tentative fragment.
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// A recognition result delivered by a transcriber.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptEvent {
    /// Fragments in recognition order.
    pub segments: Vec<TranscriptSegment>,
}

/// External speech-to-text producer.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Begin capturing speech.
    async fn start(&self) -> Result<(), TranscriberError>;
    /// Stop capturing speech.
    async fn stop(&self) -> Result<(), TranscriberError>;
}

/// Holds the query field and merges typed input with dictation.
pub struct QueryComposer {
    typed: String,
    transcribed: Option<String>,
    interim: Option<String>,
    listening: bool,
    transcriber: Option<Box<dyn Transcriber>>,
    default_limit: u32,
}

impl Default for QueryComposer {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_LIMIT)
    }
}

impl QueryComposer {
    /// Composer without a transcriber.
    pub fn new(default_limit: u32) -> Self {
        Self {
            typed: String::new(),
            transcribed: None,
            interim: None,
            listening: false,
            transcriber: None,
            default_limit,
        }
    }

    /// Attach a speech transcriber.
    pub fn with_transcriber(mut self, transcriber: Box<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Replace the field with typed text. Earlier dictation is discarded.
    pub fn set_typed(&mut self, text: impl Into<String>) {
        self.typed = text.into();
        self.transcribed = None;
        self.interim = None;
    }

    /// Fold a recognition result into the field.
    ///
    /// Final segments are concatenated and overwrite the field. A result with only interim
    /// segments changes the visible text and nothing else.
    pub fn apply_transcript(&mut self, event: &TranscriptEvent) {
        let finals: String = event
            .segments
            .iter()
            .filter(|segment| segment.is_final)
            .map(|segment| segment.text.as_str())
            .collect();

        if event.segments.iter().any(|segment| segment.is_final) {
            self.transcribed = Some(finals);
            self.interim = None;
        } else {
            let interim: String = event
                .segments
                .iter()
                .map(|segment| segment.text.as_str())
                .collect();
            self.interim = Some(interim);
        }
    }

    /// Text currently shown in the query field.
    pub fn visible_text(&self) -> &str {
        self.interim
            .as_deref()
            .or(self.transcribed.as_deref())
            .unwrap_or(&self.typed)
    }

    /// Whether dictation is active.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Start dictation. Without a transcriber this does nothing.
    pub async fn start_listening(&mut self) -> Result<(), TranscriberError> {
        let Some(transcriber) = self.transcriber.as_ref() else {
            return Ok(());
        };
        transcriber.start().await?;
        self.listening = true;
        Ok(())
    }

    /// Stop dictation. Failures to stop are logged and swallowed.
    pub async fn stop_listening(&mut self) {
        if !self.listening {
            return;
        }
        self.listening = false;
        self.interim = None;
        if let Some(transcriber) = self.transcriber.as_ref()
            && let Err(error) = transcriber.stop().await
        {
            tracing::debug!(%error, "Transcriber did not stop cleanly");
        }
    }

    /// The transcriber ended capture on its own.
    pub fn transcription_ended(&mut self) {
        self.listening = false;
        self.interim = None;
    }

    /// Build a request from the current field, then halt any active dictation.
    ///
    /// Validation happens first: an empty query leaves dictation running and returns
    /// [`ComposeError::EmptyQuery`].
    pub async fn compose(&mut self, limit_input: &str) -> Result<SearchRequest, ComposeError> {
        let request = build_request(
            &self.typed,
            self.transcribed.as_deref(),
            limit_input,
            self.default_limit,
        )?;
        self.stop_listening().await;
        Ok(request)
    }
}

/// Build a search request.
///
/// A non-empty final transcription takes precedence over typed text. The query is trimmed and
/// must not be empty. The limit is coerced with [`parse_limit`].
pub fn build_request(
    typed: &str,
    transcribed: Option<&str>,
    limit_input: &str,
    default_limit: u32,
) -> Result<SearchRequest, ComposeError> {
    let source = transcribed
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(typed);
    let query = source.trim();
    if query.is_empty() {
        return Err(ComposeError::EmptyQuery);
    }

    Ok(SearchRequest {
        query: query.to_string(),
        top_k: parse_limit(limit_input, default_limit),
    })
}

/// Coerce user input to a result limit.
///
/// The leading integer is used; trailing characters are ignored. Unparseable input or zero yields
/// `default_limit`, and the result is clamped into `1..=20`.
pub fn parse_limit(input: &str, default_limit: u32) -> u32 {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];

    let value = match digits.parse::<u64>() {
        Ok(0) => default_limit,
        Ok(_) if negative => MIN_LIMIT,
        Ok(value) => u32::try_from(value).unwrap_or(MAX_LIMIT),
        Err(_) if digits.is_empty() => default_limit,
        Err(_) if negative => MIN_LIMIT,
        Err(_) => MAX_LIMIT,
    };
    value.clamp(MIN_LIMIT, MAX_LIMIT)
}
