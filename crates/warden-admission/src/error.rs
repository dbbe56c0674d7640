/// Errors returned by the admission controller.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The controller has been shut down and accepts no more work.
    #[error("admission controller is shutting down")]
    ShuttingDown,
}

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;
