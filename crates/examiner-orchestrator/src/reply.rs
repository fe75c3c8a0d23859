//! Parsing of examiner replies.
//!
//! Answer replies carry a control tag telling the session whether to move on
//! ([`NEXT_TAG`]) or stay on the question ([`FOLLOW_UP_TAG`]). Grading replies
//! carry a `Score: N` line.

use once_cell::sync::Lazy;
use regex::Regex;

use examiner_report::MAX_SCORE;

/// Tag the examiner uses to finish the current question.
pub const NEXT_TAG: &str = "[[NEXT]]";

/// Tag the examiner uses to ask a follow-up on the current question.
pub const FOLLOW_UP_TAG: &str = "[[FOLLOW_UP]]";

#[allow(clippy::expect_used)]
static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[\[\s*(NEXT|FOLLOW[_ ]?UP)\s*\]\]").expect("tag pattern is valid")
});

#[allow(clippy::expect_used)]
static SCORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:score|оцінка|бал)\s*[:=]?\s*\**\s*(\d+(?:[.,]\d+)?)\s*(?:/\s*10)?")
        .expect("score pattern is valid")
});

/// What the examiner wants to do after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Move to the next question.
    Next,
    /// Ask a follow-up on the same question.
    FollowUp,
}

/// An answer reply with its tags removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// Reply text without any control tags, trimmed.
    pub text: String,
    /// The last tag in the reply, if any.
    pub directive: Option<Directive>,
}

/// Extracts the control tag from an answer reply.
///
/// When several tags appear, the last one wins. All tags are stripped from
/// the returned text.
#[must_use]
pub fn parse_answer_reply(reply: &str) -> ParsedReply {
    let directive = TAG_RE.captures_iter(reply).last().map(|caps| {
        if caps[1].eq_ignore_ascii_case("next") {
            Directive::Next
        } else {
            Directive::FollowUp
        }
    });

    ParsedReply {
        text: TAG_RE.replace_all(reply, "").trim().to_string(),
        directive,
    }
}

/// Extracts the final score from a grading reply.
///
/// Takes the last `Score: N` occurrence. Returns `None` when no score is
/// present or the value lies outside `0..=10`.
#[must_use]
pub fn parse_score(reply: &str) -> Option<f64> {
    let caps = SCORE_RE.captures_iter(reply).last()?;
    let value: f64 = caps[1].replace(',', ".").parse().ok()?;
    (0.0..=MAX_SCORE).contains(&value).then_some(value)
}
