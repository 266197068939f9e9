// Domain error kinds for the moderation core.
//
// Storage backends and HTTP plumbing speak anyhow. Anything that crosses
// into the reputation / policy / engine layer is mapped onto one of these
// variants so callers can decide between "skip", "reject" and "retry".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModerationError {
    /// The toxicity classifier failed or returned something unusable.
    /// The message is left unmoderated and no state is touched.
    #[error("toxicity classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// An administrator supplied a threshold outside 0..=100 or a non-number.
    #[error("invalid threshold {input:?}: must be a whole number from 0 to 100 (0 disables)")]
    InvalidThreshold { input: String },

    /// An administrator supplied an empty log channel id.
    #[error("invalid log channel {input:?}: must not be empty")]
    InvalidChannel { input: String },

    /// Reputation was requested for a user with no recorded messages.
    #[error("no recorded messages for this user")]
    DivisionUndefined,

    /// The backing store could not complete the operation. Retryable.
    #[error("storage unavailable: {0:#}")]
    StorageUnavailable(anyhow::Error),
}

impl ModerationError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModerationError::StorageUnavailable(_))
    }
}

impl From<anyhow::Error> for ModerationError {
    fn from(err: anyhow::Error) -> Self {
        ModerationError::StorageUnavailable(err)
    }
}

pub type Result<T> = std::result::Result<T, ModerationError>;
