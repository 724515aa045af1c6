pub mod orchestrator;
pub mod page;
pub mod prompt;
pub mod session;

pub use orchestrator::GenerationOrchestrator;
pub use page::{Angle, PageAnalysis, PageData, Platform, ThreadMessage};
pub use session::{GeneratedMessage, SessionSnapshot, SessionState};
