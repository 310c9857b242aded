pub mod candidate;
pub mod filter;
pub mod outcome;

pub use candidate::{Candidate, EnrichedCandidate, FLOAT_UNAVAILABLE};
pub use filter::{BaselineMode, FilterConfig, ScanOptions};
pub use outcome::{CandidateOutcome, FilterStage, SkipReason, SkippedCandidate, StageCount};
