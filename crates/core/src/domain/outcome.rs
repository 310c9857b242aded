use crate::domain::candidate::EnrichedCandidate;
use serde::{Deserialize, Serialize};

/// Filter stages in the order the pipeline applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    Parse,
    Price,
    PercentChange,
    RelativeVolume,
    Float,
    News,
}

impl FilterStage {
    pub const ALL: [FilterStage; 6] = [
        FilterStage::Parse,
        FilterStage::Price,
        FilterStage::PercentChange,
        FilterStage::RelativeVolume,
        FilterStage::Float,
        FilterStage::News,
    ];
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::Price => write!(f, "price range"),
            Self::PercentChange => write!(f, "percent change"),
            Self::RelativeVolume => write!(f, "relative volume"),
            Self::Float => write!(f, "float"),
            Self::News => write!(f, "news"),
        }
    }
}

/// Why a candidate left the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    InvalidRecord { detail: String },
    DuplicateSymbol,
    PriceOutOfRange { price: f64 },
    ChangeBelowMinimum { change_percent: f64 },
    RelativeVolumeBelowMinimum { relative_volume: f64 },
    FloatAboveMaximum { float_millions: f64 },
    NoNews,
}

impl SkipReason {
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidRecord {
            detail: detail.into(),
        }
    }

    pub fn stage(&self) -> FilterStage {
        match self {
            Self::InvalidRecord { .. } | Self::DuplicateSymbol => FilterStage::Parse,
            Self::PriceOutOfRange { .. } => FilterStage::Price,
            Self::ChangeBelowMinimum { .. } => FilterStage::PercentChange,
            Self::RelativeVolumeBelowMinimum { .. } => FilterStage::RelativeVolume,
            Self::FloatAboveMaximum { .. } => FilterStage::Float,
            Self::NoNews => FilterStage::News,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRecord { detail } => write!(f, "invalid record: {detail}"),
            Self::DuplicateSymbol => write!(f, "duplicate symbol"),
            Self::PriceOutOfRange { price } => write!(f, "price {price} out of range"),
            Self::ChangeBelowMinimum { change_percent } => {
                write!(f, "change {change_percent}% below minimum")
            }
            Self::RelativeVolumeBelowMinimum { relative_volume } => {
                write!(f, "relative volume {relative_volume:.2} below minimum")
            }
            Self::FloatAboveMaximum { float_millions } => {
                write!(f, "float {float_millions}M above maximum")
            }
            Self::NoNews => write!(f, "no recent headline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub feed_index: usize,
    /// Absent when the record was rejected before a symbol could be read.
    pub symbol: Option<String>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    Passed(Box<EnrichedCandidate>),
    Skipped(SkippedCandidate),
}

/// Funnel entry: how many candidates reached a stage and how many it removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: FilterStage,
    pub entered: usize,
    pub passed: usize,
    pub eliminated: usize,
    /// Share of `entered` removed at this stage (%).
    pub elimination_rate: f64,
}

impl StageCount {
    pub fn new(stage: FilterStage, entered: usize, eliminated: usize) -> Self {
        let eliminated = eliminated.min(entered);
        let elimination_rate = if entered > 0 {
            (eliminated as f64 / entered as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            entered,
            passed: entered - eliminated,
            eliminated,
            elimination_rate,
        }
    }
}

/// Builds the stage-by-stage funnel from the skip list.
pub fn funnel(total_records: usize, skipped: &[SkippedCandidate]) -> Vec<StageCount> {
    let mut entered = total_records;
    let mut out = Vec::with_capacity(FilterStage::ALL.len());
    for stage in FilterStage::ALL {
        let eliminated = skipped.iter().filter(|s| s.reason.stage() == stage).count();
        let count = StageCount::new(stage, entered, eliminated);
        entered = count.passed;
        out.push(count);
    }
    out
}
