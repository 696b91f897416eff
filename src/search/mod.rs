//! Search query composition and execution.

pub mod composer;
pub mod service;

pub use composer::{
    ComposeError, MAX_LIMIT, MIN_LIMIT, QueryComposer, TranscriptEvent, TranscriptSegment,
    Transcriber, TranscriberError, build_request, parse_limit,
};
pub use service::SearchService;
