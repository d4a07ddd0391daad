//! InterviewController: per-conversation turn handling, document generation
//! and delivery.
//!
//! Every inbound turn runs load → mutate → save under a lock scoped to its
//! conversation identifier. Failures never escape `handle`; they become a
//! reply the channel can send as-is.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::delivery::DocumentDelivery;
use crate::error::{InterviewError, LlmError};
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use crate::store::SessionStore;

use super::completion::{CompletionPolicy, MarkerMatch, OracleJudged, has_content, user_facing};
use super::model::{COMPLETION_MARKER, TopicSchedule, Turn};
use super::prompts::{final_document_prompt, next_question_prompt, oracle_messages};
use super::state::{InterviewPhase, InterviewState};

/// Reply to an empty or unreadable inbound message.
pub const UNREADABLE_MESSAGE: &str = "I couldn't understand that. Please try again.";

/// Reply when the oracle fails while collecting answers.
pub const ORACLE_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong on our side. Please send your last message again.";

/// Reply when the final document could not be generated.
pub const NOT_GENERATED_MESSAGE: &str =
    "Sorry, your plan could not be generated right now. Send any message to try again.";

/// Reply when the document was generated but could not be delivered.
pub const UNDELIVERABLE_MESSAGE: &str = "Your plan was generated but we could not deliver it. \
     Send any message and we will retry the delivery.";

/// Reply when session storage is unavailable.
pub const STORE_FAILURE_MESSAGE: &str =
    "Sorry, we could not load your conversation. Please try again in a moment.";

/// Asked when the oracle's output carries no question and no topic is known.
pub const FOLLOW_UP_MESSAGE: &str = "Could you tell me a bit more about that?";

/// Default oracle temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default cap on oracle output tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// One message from a user.
#[derive(Debug, Clone)]
pub struct InboundTurn {
    pub conversation_id: String,
    pub text: String,
}

impl InboundTurn {
    pub fn new(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            text: text.into(),
        }
    }

    /// The trimmed message text; blank messages are rejected.
    pub fn content(&self) -> Result<&str, InterviewError> {
        match self.text.trim() {
            "" => Err(InterviewError::EmptyMessage),
            text => Ok(text),
        }
    }
}

/// Outcome of one turn, ready to send back on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Text for the user. Never contains the completion marker.
    pub text: String,
    /// Phase after the turn, or `None` if state was not touched.
    pub phase: Option<InterviewPhase>,
}

impl Reply {
    fn untouched(text: &str) -> Self {
        Self {
            text: text.to_string(),
            phase: None,
        }
    }
}

/// Read-only view of a conversation, for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationStatus {
    pub conversation_id: String,
    pub phase: InterviewPhase,
    pub turns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
}

/// Drives interviews for any number of conversation identifiers.
pub struct InterviewController {
    llm: Arc<dyn LlmProvider>,
    sessions: Arc<dyn SessionStore>,
    delivery: Arc<DocumentDelivery>,
    policy: Arc<dyn CompletionPolicy>,
    schedule: TopicSchedule,
    temperature: f32,
    max_tokens: u32,
    locks: TurnLocks,
}

/// One async lock per conversation with a turn in flight.
///
/// Entries exist only while some turn holds or waits on them, so the map
/// stays bounded by the number of concurrent conversations.
#[derive(Default)]
struct TurnLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnLocks {
    async fn acquire(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().await;
        locks.entry(conversation_id.to_string()).or_default().clone()
    }

    /// Give back a lock from `acquire`, dropping the entry if nobody else has it.
    async fn release(&self, conversation_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.inner.lock().await;
        drop(lock);
        if locks
            .get(conversation_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            locks.remove(conversation_id);
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

impl InterviewController {
    /// Controller with the business-plan schedule and oracle-judged completion.
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        sessions: Arc<dyn SessionStore>,
        delivery: Arc<DocumentDelivery>,
    ) -> Self {
        Self {
            llm,
            sessions,
            delivery,
            policy: Arc::new(OracleJudged::new(MarkerMatch::default())),
            schedule: TopicSchedule::default(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            locks: TurnLocks::default(),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn CompletionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_schedule(mut self, schedule: TopicSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn schedule(&self) -> &TopicSchedule {
        &self.schedule
    }

    /// Handle one inbound turn end to end and produce the reply.
    pub async fn handle(&self, turn: InboundTurn) -> Reply {
        let text = match turn.content() {
            Ok(text) => text,
            Err(e) => {
                warn!(conversation_id = %turn.conversation_id, error = %e, "Rejected inbound message");
                return Reply::untouched(UNREADABLE_MESSAGE);
            }
        };

        let lock = self.locks.acquire(&turn.conversation_id).await;
        let reply = {
            let _guard = lock.lock().await;
            self.handle_locked(&turn.conversation_id, text).await
        };
        self.locks.release(&turn.conversation_id, lock).await;
        reply
    }

    async fn handle_locked(&self, conversation_id: &str, text: &str) -> Reply {
        let mut state = match self.sessions.load(conversation_id).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                info!(conversation_id, "Starting new interview");
                InterviewState::new(conversation_id)
            }
            Err(e) => {
                error!(conversation_id, error = %e, "Failed to load session");
                return Reply::untouched(STORE_FAILURE_MESSAGE);
            }
        };

        let text = match self.advance(&mut state, text).await {
            Ok(text) => text,
            Err(e) => {
                error!(
                    conversation_id,
                    phase = %state.phase(),
                    error = %e,
                    "Interview step failed"
                );
                ORACLE_FAILURE_MESSAGE.to_string()
            }
        };

        if let Err(e) = self.sessions.save(&state).await {
            warn!(conversation_id, error = %e, "Failed to persist session");
        }

        Reply {
            text,
            phase: Some(state.phase()),
        }
    }

    /// Current status of a conversation, if it exists.
    pub async fn status(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationStatus>, crate::error::DatabaseError> {
        Ok(self
            .sessions
            .load(conversation_id)
            .await?
            .map(|state| ConversationStatus {
                conversation_id: state.conversation_id().to_string(),
                phase: state.phase(),
                turns: state.conversation().len(),
                document_url: state.document.as_ref().map(|d| d.locator.clone()),
            }))
    }

    async fn advance(
        &self,
        state: &mut InterviewState,
        text: &str,
    ) -> Result<String, InterviewError> {
        match state.phase() {
            InterviewPhase::Collecting => self.collect(state, text).await,
            // Left over from an interrupted turn; the conversation is already sealed.
            InterviewPhase::Generating => self.generate(state).await,
            InterviewPhase::Failed => {
                info!(
                    conversation_id = %state.conversation_id(),
                    cached = state.pending_document.is_some(),
                    "Retrying after failure"
                );
                state.transition_to(InterviewPhase::Generating)?;
                self.generate(state).await
            }
            InterviewPhase::Delivered => {
                let locator = state
                    .document
                    .as_ref()
                    .map(|d| d.locator.clone())
                    .unwrap_or_default();
                Ok(format!(
                    "Your {} has already been delivered: {locator}",
                    self.delivery.title()
                ))
            }
        }
    }

    async fn collect(
        &self,
        state: &mut InterviewState,
        text: &str,
    ) -> Result<String, InterviewError> {
        state.conversation_mut().append(Turn::user(text));

        let verdict = self
            .policy
            .assess_conversation(&self.schedule, state.conversation());
        if verdict.is_some_and(|v| v.is_complete()) {
            info!(
                conversation_id = %state.conversation_id(),
                policy = self.policy.name(),
                "All topics covered"
            );
            state
                .conversation_mut()
                .append(Turn::assistant(COMPLETION_MARKER));
            state.transition_to(InterviewPhase::Generating)?;
            return self.generate(state).await;
        }

        let focus = self.policy.focus_topic(&self.schedule, state.conversation());
        let prompt = next_question_prompt(&self.schedule, state.conversation(), focus);
        let response = match self.ask(state, &prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    conversation_id = %state.conversation_id(),
                    error = %e,
                    "Oracle failed while collecting"
                );
                return Ok(ORACLE_FAILURE_MESSAGE.to_string());
            }
        };

        let output = response.content;
        if self.policy.assess_output(&output).is_complete() {
            state
                .conversation_mut()
                .append(Turn::assistant(output.as_str()));
            info!(
                conversation_id = %state.conversation_id(),
                turns = state.conversation().len(),
                "Interview complete"
            );
            state.transition_to(InterviewPhase::Generating)?;
            return self.generate(state).await;
        }

        if !has_content(&output) {
            // A marker the policy did not accept, or bare punctuation.
            let question = follow_up_question(focus);
            warn!(
                conversation_id = %state.conversation_id(),
                output = %output,
                "Oracle output had no question, asking a follow-up"
            );
            state
                .conversation_mut()
                .append(Turn::assistant(question.as_str()));
            return Ok(question);
        }

        state
            .conversation_mut()
            .append(Turn::assistant(output.as_str()));
        Ok(user_facing(&output))
    }

    /// Produce the document (or reuse the cached one) and deliver it.
    async fn generate(&self, state: &mut InterviewState) -> Result<String, InterviewError> {
        let content = match state.pending_document.clone() {
            Some(cached) => cached,
            None => {
                let prompt = final_document_prompt(
                    self.delivery.title(),
                    &self.schedule,
                    state.conversation(),
                );
                match self.ask(state, &prompt).await {
                    Ok(response) => {
                        state.pending_document = Some(response.content.clone());
                        response.content
                    }
                    Err(e) => {
                        warn!(
                            conversation_id = %state.conversation_id(),
                            error = %e,
                            "Document generation failed"
                        );
                        state.transition_to(InterviewPhase::Failed)?;
                        return Ok(NOT_GENERATED_MESSAGE.to_string());
                    }
                }
            }
        };

        match self.delivery.deliver(&content).await {
            Ok(document) => {
                let locator = document.locator.clone();
                state.document = Some(document);
                state.pending_document = None;
                state.transition_to(InterviewPhase::Delivered)?;
                info!(
                    conversation_id = %state.conversation_id(),
                    locator = %locator,
                    "Document delivered"
                );
                Ok(format!(
                    "Your {} is ready: {locator}",
                    self.delivery.title()
                ))
            }
            Err(e) => {
                warn!(
                    conversation_id = %state.conversation_id(),
                    error = %e,
                    "Document delivery failed"
                );
                state.transition_to(InterviewPhase::Failed)?;
                Ok(UNDELIVERABLE_MESSAGE.to_string())
            }
        }
    }

    /// One oracle round-trip, echoing and refreshing the continuation token.
    async fn ask(
        &self,
        state: &mut InterviewState,
        prompt: &str,
    ) -> Result<CompletionResponse, LlmError> {
        let request = CompletionRequest::new(oracle_messages(prompt))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_previous_response_id(state.continuation.clone());
        debug!(
            conversation_id = %state.conversation_id(),
            prompt_len = prompt.len(),
            "Calling oracle"
        );

        let response = self.llm.complete(request).await?;
        if response.content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason: "empty completion".to_string(),
            });
        }
        if let Some(ref id) = response.response_id {
            state.continuation = Some(id.clone());
        }
        debug!(
            conversation_id = %state.conversation_id(),
            output = %response.content,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Oracle replied"
        );
        Ok(response)
    }
}

fn follow_up_question(focus: Option<&str>) -> String {
    match focus {
        Some(topic) => format!("Could you tell me more about {topic}?"),
        None => FOLLOW_UP_MESSAGE.to_string(),
    }
}
