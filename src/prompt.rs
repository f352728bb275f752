//! Prompt templates and model-output parsing.
//!
//! All prompts sent to the language model backends are built here, and the
//! numbered question lists they return are parsed back into plain strings.

/// System prompt for the question generator role.
pub const SYSTEM_PROMPT: &str = "\
You are a research assistant that explores topics by generating insightful, \
novel, progressively refined questions and flagging contradictions from \
retrieved information. Expand, clarify and challenge; prioritize novelty and \
avoid repetition. Be concise, specific and research-oriented; no filler.";

/// Rubric prepended to every generation prompt.
pub const RUBRIC: &str = "\
Ask succinct expert-level questions (why/what if/how). Hunt contradictions \
and edge cases. Avoid trivia.";

/// System prompt for the NLI classifier role.
pub const NLI_SYSTEM_PROMPT: &str = "\
You are a natural language inference classifier. Given two questions, decide \
whether they contradict each other, one entails the other, or neither. \
Be cautious; do not overclaim contradictions.";

/// Candidates shorter than this are parser noise, not questions.
const MIN_QUESTION_LEN: usize = 6;

/// Build the generation prompt for one round.
///
/// `focus` is the seed topic in round 0 and the most novel question of the
/// previous round afterwards, so each round diverges from where the last one
/// left off. The accepted trail is included so the model avoids repeating it.
pub fn generation_prompt(
    topic: &str,
    focus: &str,
    trail: &[&str],
    context: &[&str],
    n: usize,
) -> String {
    let mut prompt = format!("{RUBRIC}\nTopic: {topic}\nCurrent focus: {focus}\n");

    if !context.is_empty() {
        prompt.push_str("Context:\n");
        for line in context {
            prompt.push_str("- ");
            prompt.push_str(line);
            prompt.push('\n');
        }
    }

    if !trail.is_empty() {
        prompt.push_str("Questions already asked (do not repeat):\n");
        for q in trail {
            prompt.push_str("- ");
            prompt.push_str(q);
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!(
        "\nProduce up to {n} distinct questions (<=25 words). Number them."
    ));
    prompt
}

/// Build the NLI prompt for one pair of questions.
///
/// The expected reply is a single line `LABEL CONFIDENCE`, which
/// [`crate::dissonance`] parses back into a relation.
pub fn nli_prompt(text_a: &str, text_b: &str) -> String {
    format!(
        "Question A: {text_a}\nQuestion B: {text_b}\n\n\
         Reply with exactly one line: LABEL CONFIDENCE\n\
         where LABEL is one of CONTRADICTION, ENTAILMENT, NEUTRAL \
         and CONFIDENCE is a number between 0 and 1."
    )
}

/// Parse a numbered question list out of raw model output.
///
/// Accepts `1. text`, `1) text` and `- text` prefixes as well as bare lines;
/// drops blank and too-short lines.
pub fn parse_question_list(raw: &str) -> Vec<String> {
    let mut questions = Vec::new();
    for line in raw.lines() {
        let line = strip_list_prefix(line.trim());
        if line.len() < MIN_QUESTION_LEN {
            continue;
        }
        questions.push(line.to_string());
    }
    questions
}

/// Remove a leading `1.`, `12)`, `-` or `*` marker, if present.
fn strip_list_prefix(line: &str) -> &str {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim_start();
        }
    }
    if let Some(stripped) = line.strip_prefix('-').or_else(|| line.strip_prefix('*')) {
        return stripped.trim_start();
    }
    line
}
