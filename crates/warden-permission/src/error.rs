use thiserror::Error;

/// Errors raised while forwarding a consent request.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The agent did not pass the approval route in the environment.
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    /// The bridge could not be reached or answered with a malformed body.
    #[error("approval bridge request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias for the consent server.
pub type PermissionResult<T> = Result<T, PermissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_names_the_variable() {
        let err = PermissionError::MissingEnv("WARDEN_APPROVAL_URL");
        assert_eq!(
            err.to_string(),
            "environment variable WARDEN_APPROVAL_URL is not set"
        );
    }
}
