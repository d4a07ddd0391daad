//! The interview: conversation model, state machine, prompts, completion
//! detection and the controller that ties them together.

pub mod completion;
pub mod controller;
pub mod model;
pub mod prompts;
pub mod state;

pub use completion::{
    CompletionPolicy, MarkerMatch, OracleJudged, PolicyKind, ScheduleCoverage, Verdict,
    build_policy, detect_marker, has_content, user_facing,
};
pub use controller::{ConversationStatus, InboundTurn, InterviewController, Reply};
pub use model::{COMPLETION_MARKER, Conversation, TopicSchedule, Turn, TurnRole};
pub use state::{InterviewPhase, InterviewState};
