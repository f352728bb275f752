//! Contradiction detection via NLI prompting.
//!
//! The detector pairs two question texts into a structured prompt, asks the
//! router in its NLI role for a one-line `LABEL CONFIDENCE` verdict, and maps
//! the reply onto the three-way [`Relation`] enum. The detector adds no
//! randomness of its own: identical model output yields identical verdicts.
//!
//! Classification is best-effort. A failed call or an unparseable verdict is
//! a pair-local error; the caller skips the pair (treats it as neutral) and
//! exploration continues.

use crate::error::{RouterError, RouterResult};
use crate::prompt;
use crate::router::Generate;
use crate::session::Relation;

/// Capability interface for classifying the relation between two questions.
pub trait RelationClassifier: Send + Sync {
    /// Classify the pair, returning the relation and a confidence in [0,1].
    fn classify(&self, text_a: &str, text_b: &str) -> RouterResult<(Relation, f32)>;
}

/// NLI detector backed by a language model router.
pub struct NliDetector<G: Generate> {
    model: G,
}

impl<G: Generate> NliDetector<G> {
    pub fn new(model: G) -> Self {
        Self { model }
    }
}

impl<G: Generate> RelationClassifier for NliDetector<G> {
    fn classify(&self, text_a: &str, text_b: &str) -> RouterResult<(Relation, f32)> {
        let prompt = prompt::nli_prompt(text_a, text_b);
        let raw = self.model.generate(&prompt, Some(prompt::NLI_SYSTEM_PROMPT))?;
        parse_verdict(&raw)
    }
}

/// Parse a `LABEL CONFIDENCE` verdict out of raw model output.
///
/// Scans lines for the first one carrying a known label; the confidence is
/// the first number *after* the label, clamped to [0,1], so a list marker
/// like `1.` before the label cannot masquerade as a confidence. A label
/// without a confidence, or no label at all, is a parse error.
pub(crate) fn parse_verdict(raw: &str) -> RouterResult<(Relation, f32)> {
    for line in raw.lines() {
        let upper = line.to_ascii_uppercase();
        // Check CONTRADICTION before ENTAILMENT/NEUTRAL so a line mentioning
        // several labels resolves the same way every time.
        let (relation, label) = if upper.contains("CONTRADICTION") {
            (Relation::Contradiction, "CONTRADICTION")
        } else if upper.contains("ENTAILMENT") {
            (Relation::Entailment, "ENTAILMENT")
        } else if upper.contains("NEUTRAL") {
            (Relation::Neutral, "NEUTRAL")
        } else {
            continue;
        };

        // ASCII uppercasing preserves byte offsets, so the position found in
        // `upper` indexes `line` too.
        let after_label = upper
            .find(label)
            .map(|pos| &line[pos + label.len()..])
            .unwrap_or(line);
        let confidence = first_number(after_label).ok_or_else(|| RouterError::ParseError {
            message: format!("verdict line has no confidence: {line:?}"),
        })?;
        return Ok((relation, confidence.clamp(0.0, 1.0)));
    }

    Err(RouterError::ParseError {
        message: format!("no NLI label found in output: {raw:?}"),
    })
}

/// First parseable float in a string, e.g. the `0.87` of ` 0.87 maybe`.
fn first_number(text: &str) -> Option<f32> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|s| !s.is_empty())
        .find_map(|s| s.parse::<f32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(&'static str);

    impl Generate for Scripted {
        fn generate(&self, _prompt: &str, _system: Option<&str>) -> RouterResult<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn parses_plain_verdict() {
        let (relation, confidence) = parse_verdict("CONTRADICTION 0.87").unwrap();
        assert_eq!(relation, Relation::Contradiction);
        assert!((confidence - 0.87).abs() < 1e-6);
    }

    #[test]
    fn parses_verdict_with_chatter() {
        let raw = "Sure, here is my verdict:\nentailment 0.72\nHope this helps!";
        let (relation, confidence) = parse_verdict(raw).unwrap();
        assert_eq!(relation, Relation::Entailment);
        assert!((confidence - 0.72).abs() < 1e-6);
    }

    #[test]
    fn clamps_out_of_range_confidence() {
        let (_, confidence) = parse_verdict("NEUTRAL 1.4").unwrap();
        assert_eq!(confidence, 1.0);
    }

    #[test]
    fn list_marker_before_label_is_not_the_confidence() {
        let (relation, confidence) = parse_verdict("1. CONTRADICTION 0.9").unwrap();
        assert_eq!(relation, Relation::Contradiction);
        assert!((confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn missing_confidence_is_a_parse_error() {
        assert!(parse_verdict("CONTRADICTION").is_err());
        assert!(parse_verdict("1. CONTRADICTION").is_err());
    }

    #[test]
    fn unlabeled_output_is_a_parse_error() {
        assert!(parse_verdict("I am not sure about these two.").is_err());
    }

    #[test]
    fn detector_maps_model_output() {
        let detector = NliDetector::new(Scripted("CONTRADICTION 0.9"));
        let (relation, confidence) = detector
            .classify("Is ice denser than water?", "Does ice float because it is less dense?")
            .unwrap();
        assert_eq!(relation, Relation::Contradiction);
        assert!((confidence - 0.9).abs() < 1e-6);
    }
}
