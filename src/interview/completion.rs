//! Completion detection: deciding when the interview has gathered enough.
//!
//! Two policies sit behind the `CompletionPolicy` trait:
//! - [`OracleJudged`] lets the oracle decide and looks for the completion
//!   marker in its output.
//! - [`ScheduleCoverage`] decides deterministically from the user's turns:
//!   every topic label must appear in at least one of them.

use std::sync::Arc;

use super::model::{COMPLETION_MARKER, Conversation, TopicSchedule};

/// How the completion marker is matched in oracle output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerMatch {
    /// Output, trimmed of surrounding whitespace, must equal the marker.
    #[default]
    Exact,
    /// Marker may appear anywhere in the output.
    Substring,
}

impl std::str::FromStr for MarkerMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "substring" | "contains" => Ok(Self::Substring),
            other => Err(format!(
                "Invalid marker match '{other}'. Expected 'exact' or 'substring'"
            )),
        }
    }
}

/// Outcome of a completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Complete,
    Incomplete,
}

impl Verdict {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Classify raw oracle output. Pure, so repeated calls agree.
///
/// Under `Exact`, a marker wrapped only in punctuation or whitespace
/// (`"[INTERVIEW_COMPLETE]."`) still counts: nothing else was said.
pub fn detect_marker(output: &str, matching: MarkerMatch) -> Verdict {
    let found = match matching {
        MarkerMatch::Exact => output.contains(COMPLETION_MARKER) && !has_content(output),
        MarkerMatch::Substring => output.contains(COMPLETION_MARKER),
    };
    if found {
        Verdict::Complete
    } else {
        Verdict::Incomplete
    }
}

/// Text safe to show the user: the stored output with any marker removed.
pub fn user_facing(output: &str) -> String {
    output.replace(COMPLETION_MARKER, "").trim().to_string()
}

/// Whether the output says anything once the marker is removed.
pub fn has_content(output: &str) -> bool {
    user_facing(output).chars().any(char::is_alphanumeric)
}

/// Pluggable rule for ending the interview.
pub trait CompletionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Verdict from the conversation alone, before the oracle is asked.
    /// `Some(Verdict::Complete)` skips the oracle call for this turn.
    fn assess_conversation(
        &self,
        _schedule: &TopicSchedule,
        _conversation: &Conversation,
    ) -> Option<Verdict> {
        None
    }

    /// A topic the next question should target, if the policy knows one.
    fn focus_topic<'a>(
        &self,
        _schedule: &'a TopicSchedule,
        _conversation: &Conversation,
    ) -> Option<&'a str> {
        None
    }

    /// Verdict on the oracle's next-question output.
    fn assess_output(&self, output: &str) -> Verdict;
}

/// The oracle judges coverage and signals it with the marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleJudged {
    matching: MarkerMatch,
}

impl OracleJudged {
    pub fn new(matching: MarkerMatch) -> Self {
        Self { matching }
    }
}

impl CompletionPolicy for OracleJudged {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn assess_output(&self, output: &str) -> Verdict {
        detect_marker(output, self.matching)
    }
}

/// Complete once every topic label appears (case-insensitively) in a user turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleCoverage;

impl ScheduleCoverage {
    /// Topics no user turn has mentioned yet, in schedule order.
    pub fn uncovered_topics<'a>(
        schedule: &'a TopicSchedule,
        conversation: &Conversation,
    ) -> Vec<&'a str> {
        let user_text: Vec<String> = conversation
            .user_contents()
            .map(str::to_lowercase)
            .collect();
        schedule
            .topics()
            .iter()
            .filter(|topic| {
                let needle = topic.to_lowercase();
                !user_text.iter().any(|text| text.contains(&needle))
            })
            .map(String::as_str)
            .collect()
    }
}

impl CompletionPolicy for ScheduleCoverage {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn assess_conversation(
        &self,
        schedule: &TopicSchedule,
        conversation: &Conversation,
    ) -> Option<Verdict> {
        if Self::uncovered_topics(schedule, conversation).is_empty() {
            Some(Verdict::Complete)
        } else {
            Some(Verdict::Incomplete)
        }
    }

    fn focus_topic<'a>(
        &self,
        schedule: &'a TopicSchedule,
        conversation: &Conversation,
    ) -> Option<&'a str> {
        Self::uncovered_topics(schedule, conversation)
            .into_iter()
            .next()
    }

    fn assess_output(&self, _output: &str) -> Verdict {
        // Coverage is decided before the oracle is called.
        Verdict::Incomplete
    }
}

/// Which completion policy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    #[default]
    Oracle,
    Coverage,
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oracle" => Ok(Self::Oracle),
            "coverage" | "schedule" => Ok(Self::Coverage),
            other => Err(format!(
                "Invalid completion policy '{other}'. Expected 'oracle' or 'coverage'"
            )),
        }
    }
}

/// Build the configured policy.
pub fn build_policy(kind: PolicyKind, matching: MarkerMatch) -> Arc<dyn CompletionPolicy> {
    match kind {
        PolicyKind::Oracle => Arc::new(OracleJudged::new(matching)),
        PolicyKind::Coverage => Arc::new(ScheduleCoverage),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::interview::model::Turn;

    #[test]
    fn question_is_not_complete() {
        let output = "What is your target market?";
        assert_eq!(detect_marker(output, MarkerMatch::Exact), Verdict::Incomplete);
        assert_eq!(detect_marker(output, MarkerMatch::Substring), Verdict::Incomplete);
        assert_eq!(user_facing(output), output);
    }

    #[test]
    fn bare_marker_is_complete_under_both_matchers() {
        assert!(detect_marker(COMPLETION_MARKER, MarkerMatch::Exact).is_complete());
        assert!(detect_marker(COMPLETION_MARKER, MarkerMatch::Substring).is_complete());
        assert!(detect_marker("  [INTERVIEW_COMPLETE]\n", MarkerMatch::Exact).is_complete());
    }

    #[test]
    fn embedded_marker_only_matches_substring() {
        let output = "Thanks, that covers it! [INTERVIEW_COMPLETE]";
        assert_eq!(detect_marker(output, MarkerMatch::Exact), Verdict::Incomplete);
        assert_eq!(detect_marker(output, MarkerMatch::Substring), Verdict::Complete);
        assert_eq!(user_facing(output), "Thanks, that covers it!");
    }

    #[test]
    fn marker_with_stray_punctuation_is_complete() {
        for output in ["[INTERVIEW_COMPLETE].", "\"[INTERVIEW_COMPLETE]\"", "**[INTERVIEW_COMPLETE]**"] {
            assert!(detect_marker(output, MarkerMatch::Exact).is_complete(), "{output}");
            assert!(!has_content(output));
        }
        assert!(has_content("Who are your customers? [INTERVIEW_COMPLETE]"));
        assert!(!has_content("   "));
    }

    #[test]
    fn marker_match_parsing() {
        assert_eq!("exact".parse::<MarkerMatch>().unwrap(), MarkerMatch::Exact);
        assert_eq!("Substring".parse::<MarkerMatch>().unwrap(), MarkerMatch::Substring);
        assert!("fuzzy".parse::<MarkerMatch>().is_err());
        assert_eq!(MarkerMatch::default(), MarkerMatch::Exact);
    }

    #[test]
    fn oracle_policy_defers_to_output() {
        let policy = OracleJudged::new(MarkerMatch::Exact);
        let conversation: Conversation = [Turn::user("hello")].into_iter().collect();
        assert!(policy
            .assess_conversation(&TopicSchedule::default(), &conversation)
            .is_none());
        assert!(policy
            .focus_topic(&TopicSchedule::default(), &conversation)
            .is_none());
        assert!(policy.assess_output(COMPLETION_MARKER).is_complete());
        assert!(!policy.assess_output("Who are your customers?").is_complete());
    }

    #[test]
    fn coverage_with_four_of_five_topics_is_incomplete() {
        let schedule = TopicSchedule::default();
        let conversation: Conversation = [
            Turn::user("Business Description: a produce collection network"),
            Turn::assistant("Tell me your mission"),
            Turn::user("Business Mission: fair prices for farmers"),
            Turn::user("Business goals: 500 farmers in year one"),
            Turn::user("Target Market and Industry: agriculture in Kenya"),
        ]
        .into_iter()
        .collect();

        let policy = ScheduleCoverage;
        assert_eq!(
            policy.assess_conversation(&schedule, &conversation),
            Some(Verdict::Incomplete)
        );
        assert_eq!(
            ScheduleCoverage::uncovered_topics(&schedule, &conversation),
            vec!["Target Customer"]
        );
        assert_eq!(
            policy.focus_topic(&schedule, &conversation),
            Some("Target Customer")
        );
    }

    #[test]
    fn coverage_with_all_topics_is_complete() {
        let schedule = TopicSchedule::default();
        let conversation: Conversation = schedule
            .topics()
            .iter()
            .map(|t| Turn::user(format!("{}: details", t.to_uppercase())))
            .collect();
        assert_eq!(
            ScheduleCoverage.assess_conversation(&schedule, &conversation),
            Some(Verdict::Complete)
        );
    }

    #[test]
    fn coverage_ignores_assistant_turns() {
        let schedule = TopicSchedule::new(["Mission"]);
        let conversation: Conversation = [
            Turn::assistant("What is your Mission?"),
            Turn::user("not sure yet"),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            ScheduleCoverage.assess_conversation(&schedule, &conversation),
            Some(Verdict::Incomplete)
        );
    }

    #[test]
    fn coverage_never_completes_from_oracle_output() {
        assert_eq!(ScheduleCoverage.assess_output(COMPLETION_MARKER), Verdict::Incomplete);
    }

    #[test]
    fn build_policy_selects_kind() {
        assert_eq!(build_policy(PolicyKind::Oracle, MarkerMatch::Exact).name(), "oracle");
        assert_eq!(
            build_policy(PolicyKind::Coverage, MarkerMatch::Exact).name(),
            "coverage"
        );
        assert_eq!("schedule".parse::<PolicyKind>().unwrap(), PolicyKind::Coverage);
    }

    proptest! {
        #[test]
        fn detection_is_idempotent(output in ".{0,80}", substring in any::<bool>()) {
            let matching = if substring { MarkerMatch::Substring } else { MarkerMatch::Exact };
            let first = detect_marker(&output, matching);
            let second = detect_marker(&output, matching);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn exact_match_requires_nothing_but_the_marker(
            prefix in "[a-z]{1,10}",
            suffix in "[ .!]{0,4}"
        ) {
            let worded = format!("{prefix} {COMPLETION_MARKER}");
            let bare = format!("{COMPLETION_MARKER}{suffix}");
            prop_assert_eq!(detect_marker(&worded, MarkerMatch::Exact), Verdict::Incomplete);
            prop_assert_eq!(detect_marker(&bare, MarkerMatch::Exact), Verdict::Complete);
        }

        #[test]
        fn user_facing_never_contains_marker(
            prefix in "[ -~]{0,30}",
            suffix in "[ -~]{0,30}"
        ) {
            let output = format!("{prefix}{COMPLETION_MARKER}{suffix}");
            prop_assert!(!user_facing(&output).contains(COMPLETION_MARKER));
        }
    }
}
