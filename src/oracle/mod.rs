/// HTTP oracle implementation backed by an alfa-leetcode-api deployment.
pub mod alfa;

use futures::future::BoxFuture;

/// Half-open unix-timestamp window `[start, end)` covering one local
/// calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    /// Local midnight opening the day, unix seconds.
    pub start: i64,
    /// Next local midnight, unix seconds (exclusive).
    pub end: i64,
}

impl DayWindow {
    /// Whether a unix timestamp falls inside the window.
    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// Outcome of an oracle lookup for one handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveCheck {
    /// Whether at least one qualifying submission fell inside the window.
    pub solved: bool,
    /// Titles of the qualifying submissions, in the order the oracle
    /// returned them. Empty when not solved or when the oracle could not
    /// answer.
    pub evidence: Vec<String>,
}

impl SolveCheck {
    /// Fail-closed result used whenever the oracle cannot answer.
    pub fn not_solved() -> Self {
        Self::default()
    }
}

/// External provider answering whether a handle completed a qualifying
/// activity inside a day window.
///
/// Implementations are best-effort and fail-closed: any transient failure
/// (network, rate limit, malformed response) must surface as "not solved",
/// never as an error.
pub trait SubmissionOracle: Send + Sync {
    fn has_solved_on(&self, handle: &str, window: DayWindow) -> BoxFuture<'static, SolveCheck>;
}
