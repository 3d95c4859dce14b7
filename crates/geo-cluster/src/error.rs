//! Error types for cluster analysis

use thiserror::Error;

/// Result type for cluster analysis operations
pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClusterError {
    /// A prediction carried coordinates or a probability outside the valid range
    #[error("Invalid input for prediction rank {rank}: {reason}")]
    InvalidInput { rank: u32, reason: String },

    /// The analyzer was constructed with unusable settings
    #[error("Invalid cluster configuration: {0}")]
    InvalidConfig(String),
}

impl ClusterError {
    pub(crate) fn invalid_input(rank: u32, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            rank,
            reason: reason.into(),
        }
    }

    /// Whether this error was caused by a bad prediction rather than bad settings
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}
