//! Oracle prompts for the two interview phases.
//!
//! Both prompts embed the complete, ordered conversation via [`transcript`].

use crate::llm::ChatMessage;

use super::model::{COMPLETION_MARKER, Conversation, TopicSchedule};

/// Render every turn as `role: content`, one per line, in order.
pub fn transcript(conversation: &Conversation) -> String {
    if conversation.is_empty() {
        return "(no messages yet)".to_string();
    }
    conversation
        .turns()
        .iter()
        .map(|t| format!("{}: {}", t.role(), t.content()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking for the next interview question, or the completion marker.
///
/// `focus` names an uncovered topic when the caller already knows one. The
/// caller then owns the completion decision, so the marker is not offered.
pub fn next_question_prompt(
    schedule: &TopicSchedule,
    conversation: &Conversation,
    focus: Option<&str>,
) -> String {
    let sections = schedule.to_prompt_list();
    let instructions = match focus {
        Some(topic) => format!(
            "The next section to cover is \"{topic}\".\n\
             Ask one detailed question to collect information on that section.\n"
        ),
        None => format!(
            "Based on the conversation so far, decide whether enough information has been \
             provided for every section.\n\
             If so, output exactly {COMPLETION_MARKER} and nothing else.\n\
             If not, ask one detailed question to collect information on a section that has \
             not been covered yet.\n"
        ),
    };
    let transcript = transcript(conversation);

    format!(
        "You are an expert at collecting relevant information from entrepreneurs to write a \
         structured document with the following sections:\n\
         {sections}\n\n\
         {instructions}\
         Ask specific questions and try to minimize follow-up questions.\n\n\
         Conversation so far:\n\
         {transcript}\n"
    )
}

/// Prompt asking for the final document titled `title`, one header per
/// scheduled topic.
pub fn final_document_prompt(
    title: &str,
    schedule: &TopicSchedule,
    conversation: &Conversation,
) -> String {
    let sections = schedule.to_prompt_list();
    let transcript = transcript(conversation);

    format!(
        "You are an expert writer. Based on the conversation below, write a detailed document \
         titled \"{title}\" that uses the following sections, in this order, as section headers:\n\
         {sections}\n\n\
         Use the user's answers as the source material. Do not ask any further questions.\n\n\
         Conversation:\n\
         {transcript}\n"
    )
}

/// Wrap a prompt as the single user message sent to the oracle.
pub fn oracle_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(format!("Prompt: {prompt}"))]
}
