//! Interview state machine: which phase a conversation is in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delivery::GeneratedDocument;
use crate::error::InterviewError;

use super::model::Conversation;

/// The phases of one interview.
///
/// Collecting → Generating → Delivered, with Failed reachable from
/// Generating. A message received in Failed re-enters Generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPhase {
    Collecting,
    Generating,
    Delivered,
    Failed,
}

impl InterviewPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: InterviewPhase) -> bool {
        use InterviewPhase::*;
        matches!(
            (self, target),
            (Collecting, Generating)
                | (Generating, Delivered)
                | (Generating, Failed)
                | (Failed, Generating)
        )
    }

    /// Whether the interview is over for this conversation identifier.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl Default for InterviewPhase {
    fn default() -> Self {
        Self::Collecting
    }
}

impl std::fmt::Display for InterviewPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Collecting => "collecting",
            Self::Generating => "generating",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Persisted state of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewState {
    conversation_id: String,
    phase: InterviewPhase,
    conversation: Conversation,
    /// Provider-side continuation token, echoed back on the next oracle call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
    /// Document text generated but not yet delivered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<GeneratedDocument>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewState {
    /// Fresh state: Collecting, empty conversation.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            phase: InterviewPhase::default(),
            conversation: Conversation::new(),
            continuation: None,
            pending_document: None,
            document: None,
            updated_at: Utc::now(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn phase(&self) -> InterviewPhase {
        self.phase
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub(crate) fn conversation_mut(&mut self) -> &mut Conversation {
        self.updated_at = Utc::now();
        &mut self.conversation
    }

    /// Move to `target`, refusing transitions the machine does not define.
    pub fn transition_to(&mut self, target: InterviewPhase) -> Result<(), InterviewError> {
        if !self.phase.can_transition_to(target) {
            return Err(InterviewError::InvalidTransition {
                from: self.phase.to_string(),
                to: target.to_string(),
            });
        }
        self.phase = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}
