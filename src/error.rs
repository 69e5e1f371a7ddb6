// ⚠️ Error types for the season pipeline
//
// Recoverable problems (missing files, malformed codes, ambiguous rows) are
// logged and skipped where they happen. Only the variants below travel up
// the call stack.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SeasonError>;

#[derive(Error, Debug)]
pub enum SeasonError {
    /// Placement string is neither an ordinal nor a known sentinel
    #[error("Invalid placement: '{0}'")]
    InvalidPlacement(String),

    /// Identity code has no two-digit birth year at the expected offset
    #[error("Malformed identity code: '{0}'")]
    MalformedIdentityCode(String),

    /// Two rows being merged hold different results for the same race.
    /// This is a data-integrity failure and aborts the season run.
    #[error(
        "Irreconcilable merge in category '{category}' for '{name}': race {race} has {left} vs {right}. \
         You are probably merging people that you shouldn't."
    )]
    IrreconcilableMerge {
        category: String,
        name: String,
        race: u32,
        left: String,
        right: String,
    },

    /// A decision provider returned a decision that does not fit the group
    #[error("Invalid decision for group '{group}': {reason}")]
    InvalidDecision { group: String, reason: String },

    /// The operator closed input before answering a prompt
    #[error("Decision input closed while resolving group '{0}'")]
    DecisionAborted(String),

    /// Race registry communication or payload failure
    #[error("Race registry error: {0}")]
    Registry(String),

    /// Season table file has an unexpected shape
    #[error("Malformed standings file {path}: {reason}")]
    MalformedTable { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
