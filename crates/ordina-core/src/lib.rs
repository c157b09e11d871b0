//! Conversation orchestration: session state, intent classification,
//! access-controlled retrieval, and answer generation with the
//! two-round patient-search tool protocol.

pub mod classifier;
pub mod generator;
pub mod pipeline;
pub mod prompts;
pub mod session;
pub mod session_lock;

pub use classifier::IntentClassifier;
pub use generator::ResponseGenerator;
pub use pipeline::{TurnError, TurnPipeline};
pub use session::{SessionError, SessionStore};
pub use session_lock::{SessionGuard, SessionLocks};
