//! Feedback records.

use serde::{Deserialize, Serialize};

/// A thumbs-up or thumbs-down rating of an assistant reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackScore {
    Positive,
    Negative,
}

impl FeedbackScore {
    /// Numeric value sent to the learning endpoint.
    pub fn value(self) -> i8 {
        match self {
            FeedbackScore::Positive => 1,
            FeedbackScore::Negative => -1,
        }
    }
}

/// A rating held in local session state, keyed by message id.
///
/// Never written into the conversation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub message_id: String,
    pub score: FeedbackScore,
}
