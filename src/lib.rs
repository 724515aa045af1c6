#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::return_self_not_must_use
)]

pub mod config;
pub mod error;
pub mod generate;
pub mod llm;
pub mod profile;
pub mod store;
pub mod style;

pub use config::EngineConfig;
pub use error::{LlmError, ProfileError, ReachError, StoreError};
pub use generate::{
    Angle, GeneratedMessage, GenerationOrchestrator, PageAnalysis, PageData, Platform,
    SessionSnapshot, SessionState,
};
pub use llm::{ChatMessage, ChatRole, CompletionBackend, CompletionClient, StreamEvent};
pub use profile::{SampleSource, SegmentationPipeline, VoiceProfile, VoiceProfileBuilder, WritingSample};
pub use store::{AnalysisCache, KvStore, MemoryStore, ProfileStore};
pub use style::{
    AiScoreResult, StyleMetrics, VoiceMatchResult, compute_metrics, score_authenticity,
    score_voice_match,
};
