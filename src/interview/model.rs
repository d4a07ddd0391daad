//! Conversation data model: turns, the ordered conversation log, and the topic schedule.

use serde::{Deserialize, Serialize};

/// Reserved literal the oracle emits, alone, once every topic is covered.
///
/// Stored verbatim in the assistant turn that carried it, never shown to the user.
pub const COMPLETION_MARKER: &str = "[INTERVIEW_COMPLETE]";

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in the interview. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: TurnRole,
    content: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn role(&self) -> TurnRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Append-only, ordered log of turns for one conversation identifier.
///
/// Order is replayed verbatim into every prompt. There is no truncation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the interview controller appends.
    pub(crate) fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Contents of the user's turns, in order.
    pub fn user_contents(&self) -> impl Iterator<Item = &str> {
        self.turns
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .map(|t| t.content.as_str())
    }
}

impl FromIterator<Turn> for Conversation {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

/// Fixed, ordered list of sections the interview must cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSchedule {
    topics: Vec<String>,
}

impl TopicSchedule {
    /// Build a schedule; blank entries are dropped, order is kept.
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics
                .into_iter()
                .map(|t| {
                    let t: String = t.into();
                    t.trim().to_string()
                })
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// The five business-plan sections.
    pub fn business_plan() -> Self {
        Self::new([
            "Business Description",
            "Business Mission",
            "Business goals",
            "Target Market and Industry",
            "Target Customer",
        ])
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// One quoted topic per line, in schedule order.
    pub fn to_prompt_list(&self) -> String {
        self.topics
            .iter()
            .map(|t| format!("\"{t}\","))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for TopicSchedule {
    fn default() -> Self {
        Self::business_plan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_keeps_insertion_order() {
        let mut conversation = Conversation::new();
        conversation.append(Turn::user("hello"));
        conversation.append(Turn::assistant("What is your business?"));
        conversation.append(Turn::user("A bakery"));

        let roles: Vec<TurnRole> = conversation.turns().iter().map(Turn::role).collect();
        assert_eq!(
            roles,
            vec![TurnRole::User, TurnRole::Assistant, TurnRole::User]
        );
        assert_eq!(conversation.last().unwrap().content(), "A bakery");
        assert_eq!(
            conversation.user_contents().collect::<Vec<_>>(),
            vec!["hello", "A bakery"]
        );
    }

    #[test]
    fn conversation_serializes_as_role_content_pairs() {
        let conversation: Conversation =
            [Turn::user("hi"), Turn::assistant(COMPLETION_MARKER)].into_iter().collect();
        let json = serde_json::to_value(&conversation).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "[INTERVIEW_COMPLETE]"}
            ])
        );
        let parsed: Conversation = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, conversation);
    }

    #[test]
    fn schedule_drops_blank_topics() {
        let schedule = TopicSchedule::new(["Mission", "  ", "", " Market "]);
        assert_eq!(schedule.topics(), &["Mission".to_string(), "Market".to_string()]);
    }

    #[test]
    fn business_plan_schedule_order() {
        let schedule = TopicSchedule::default();
        assert_eq!(schedule.len(), 5);
        assert_eq!(schedule.topics()[0], "Business Description");
        assert_eq!(schedule.topics()[4], "Target Customer");
        let list = schedule.to_prompt_list();
        assert!(list.starts_with("\"Business Description\","));
        assert!(list.ends_with("\"Target Customer\","));
    }

    #[test]
    fn marker_does_not_look_like_prose() {
        assert!(COMPLETION_MARKER.starts_with('['));
        assert!(!COMPLETION_MARKER.contains(' '));
    }
}
