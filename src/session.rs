//! Session data model: questions, trails, dissonance records and the
//! exploration session that owns them.
//!
//! A session is created per request, lives for one bounded exploration, and is
//! discarded after the response is returned. The trail and dissonance log are
//! append-only; a question is immutable once scored.

use std::time::Instant;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Questions and trails
// ---------------------------------------------------------------------------

/// One generated question, scored for novelty.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    /// The question text.
    pub text: String,
    /// Which round produced it (0-based).
    pub round: u32,
    /// Novelty in [0,1]; 1.0 = maximally novel.
    pub novelty_score: f32,
    /// Whether it passed the novelty threshold. Every trail entry is accepted;
    /// the flag exists so a question is self-describing outside a trail.
    #[serde(skip)]
    pub accepted: bool,
}

/// Ordered, append-only sequence of accepted questions for one session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Trail(Vec<Question>);

impl Trail {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append an accepted question. The trail never reorders or removes.
    pub fn push(&mut self, question: Question) {
        debug_assert!(question.accepted);
        self.0.push(question);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.0.iter()
    }

    /// The most novel question of the most recent round, used as the focus
    /// for the next round's generation prompt.
    pub fn latest_focus(&self) -> Option<&Question> {
        let last_round = self.0.iter().map(|q| q.round).max()?;
        self.0
            .iter()
            .filter(|q| q.round == last_round)
            .max_by(|a, b| {
                a.novelty_score
                    .partial_cmp(&b.novelty_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

// ---------------------------------------------------------------------------
// Dissonance
// ---------------------------------------------------------------------------

/// Three-way NLI relation between a pair of questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    Contradiction,
    Entailment,
    Neutral,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Relation::Contradiction => "CONTRADICTION",
            Relation::Entailment => "ENTAILMENT",
            Relation::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// A classified non-neutral pair of accepted questions.
///
/// Indices reference positions in the session's final trail; `question_a_index`
/// is always the newer question, `question_b_index` the earlier one.
#[derive(Debug, Clone, Serialize)]
pub struct DissonanceRecord {
    pub question_a_index: usize,
    pub question_b_index: usize,
    pub relation: Relation,
    /// Classifier confidence in [0,1].
    pub confidence: f32,
}

/// Ordered, append-only sequence of dissonance records for one session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DissonanceLog(Vec<DissonanceRecord>);

impl DissonanceLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, record: DissonanceRecord) {
        self.0.push(record);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DissonanceRecord> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// How (and whether) an exploration session has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Still inside the exploration loop.
    Running,
    /// The last round accepted zero candidates: novelty around this topic is
    /// exhausted.
    CompletedThreshold,
    /// Wall-clock time limit exceeded.
    CompletedTimeout,
    /// The hard round ceiling was reached.
    CompletedMaxRounds,
    /// The generator returned no candidates (or failed); the session ended
    /// early with whatever trail had accumulated.
    CompletedExhausted,
    /// Cancelled externally at a round boundary.
    Cancelled,
}

impl SessionStatus {
    /// Whether the session has left the exploration loop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

/// One bounded exploration: the trail, its dissonance log, and bookkeeping.
///
/// Owned exclusively by the request that created it; never persisted.
#[derive(Debug, Clone)]
pub struct ExplorationSession {
    pub seed_topic: String,
    pub trail: Trail,
    pub dissonance_log: DissonanceLog,
    /// Number of fully executed rounds.
    pub round_count: u32,
    pub start_time: Instant,
    pub status: SessionStatus,
}

impl ExplorationSession {
    pub fn new(seed_topic: impl Into<String>) -> Self {
        Self {
            seed_topic: seed_topic.into(),
            trail: Trail::new(),
            dissonance_log: DissonanceLog::new(),
            round_count: 0,
            start_time: Instant::now(),
            status: SessionStatus::Running,
        }
    }

    /// Seconds elapsed since the session started.
    pub fn elapsed_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

/// Wire-level view of a finished session, shared by the CLI and the server.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub topic: String,
    pub trail: Trail,
    pub dissonance_log: DissonanceLog,
    pub status: SessionStatus,
    pub round_count: u32,
    pub elapsed_seconds: f64,
}

impl From<ExplorationSession> for SessionReport {
    fn from(session: ExplorationSession) -> Self {
        let elapsed_seconds = session.elapsed_seconds();
        Self {
            topic: session.seed_topic,
            trail: session.trail,
            dissonance_log: session.dissonance_log,
            status: session.status,
            round_count: session.round_count,
            elapsed_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, round: u32, novelty: f32) -> Question {
        Question {
            text: text.into(),
            round,
            novelty_score: novelty,
            accepted: true,
        }
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&SessionStatus::CompletedThreshold).unwrap();
        assert_eq!(json, "\"COMPLETED_THRESHOLD\"");
        let json = serde_json::to_string(&SessionStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
    }

    #[test]
    fn trail_serializes_as_array_without_accepted_flag() {
        let mut trail = Trail::new();
        trail.push(question("Why does the sky glow?", 0, 0.9));
        let json = serde_json::to_value(&trail).unwrap();
        assert!(json.is_array());
        let entry = &json[0];
        assert_eq!(entry["round"], 0);
        assert!(entry.get("accepted").is_none());
    }

    #[test]
    fn latest_focus_prefers_most_novel_of_last_round() {
        let mut trail = Trail::new();
        trail.push(question("a", 0, 0.99));
        trail.push(question("b", 1, 0.4));
        trail.push(question("c", 1, 0.7));
        assert_eq!(trail.latest_focus().unwrap().text, "c");
    }

    #[test]
    fn latest_focus_empty_trail() {
        assert!(Trail::new().latest_focus().is_none());
    }

    #[test]
    fn report_carries_session_fields() {
        let mut session = ExplorationSession::new("volcanoes");
        session.trail.push(question("q", 0, 1.0));
        session.round_count = 1;
        session.status = SessionStatus::CompletedMaxRounds;

        let report = SessionReport::from(session);
        assert_eq!(report.topic, "volcanoes");
        assert_eq!(report.round_count, 1);
        assert_eq!(report.status, SessionStatus::CompletedMaxRounds);
        assert_eq!(report.trail.len(), 1);
    }
}
