/// Errors that can occur at the approval gate's edges.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// An action callback carried an approval id that is not a valid id.
    #[error("invalid approval id: {0}")]
    InvalidId(String),
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
