//! Failure kinds shared by every provider and by the chain.

use std::fmt;

use thiserror::Error;

use crate::http::TransportError;

/// Coarse classification of a [`GeocodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedOperation,
    InvalidCredentials,
    QuotaExceeded,
    NoResult,
    InvalidArgument,
    Transport,
    DeadlineExceeded,
}

/// Error returned by a provider or chain operation.
///
/// Every variant names the provider and carries a request description with
/// secrets already masked.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("{provider}: unsupported operation: {reason} ({request})")]
    UnsupportedOperation {
        provider: String,
        request: String,
        reason: String,
    },

    #[error("{provider}: invalid credentials ({request})")]
    InvalidCredentials { provider: String, request: String },

    #[error("{provider}: quota exceeded ({request})")]
    QuotaExceeded { provider: String, request: String },

    #[error("{provider}: no result for {request}{}", AttemptSummary(.attempts))]
    NoResult {
        provider: String,
        request: String,
        attempts: Vec<Attempt>,
    },

    #[error("{provider}: invalid argument: {reason} ({request})")]
    InvalidArgument {
        provider: String,
        request: String,
        reason: String,
    },

    #[error("{provider}: transport failure for {request}: {source}")]
    Transport {
        provider: String,
        request: String,
        #[source]
        source: TransportError,
    },

    #[error("{provider}: deadline exceeded ({request})")]
    DeadlineExceeded { provider: String, request: String },
}

impl GeocodeError {
    pub fn unsupported(
        provider: &str,
        request: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GeocodeError::UnsupportedOperation {
            provider: provider.to_string(),
            request: request.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_credentials(provider: &str, request: impl Into<String>) -> Self {
        GeocodeError::InvalidCredentials {
            provider: provider.to_string(),
            request: request.into(),
        }
    }

    pub fn quota_exceeded(provider: &str, request: impl Into<String>) -> Self {
        GeocodeError::QuotaExceeded {
            provider: provider.to_string(),
            request: request.into(),
        }
    }

    pub fn no_result(provider: &str, request: impl Into<String>) -> Self {
        GeocodeError::NoResult {
            provider: provider.to_string(),
            request: request.into(),
            attempts: Vec::new(),
        }
    }

    pub fn invalid_argument(
        provider: &str,
        request: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GeocodeError::InvalidArgument {
            provider: provider.to_string(),
            request: request.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GeocodeError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            GeocodeError::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            GeocodeError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            GeocodeError::NoResult { .. } => ErrorKind::NoResult,
            GeocodeError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            GeocodeError::Transport { .. } => ErrorKind::Transport,
            GeocodeError::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
        }
    }

    /// Whether repeating the same request later can succeed without
    /// reconfiguration. Quota errors need a backoff first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::QuotaExceeded | ErrorKind::Transport | ErrorKind::DeadlineExceeded
        )
    }

    pub fn provider(&self) -> &str {
        match self {
            GeocodeError::UnsupportedOperation { provider, .. }
            | GeocodeError::InvalidCredentials { provider, .. }
            | GeocodeError::QuotaExceeded { provider, .. }
            | GeocodeError::NoResult { provider, .. }
            | GeocodeError::InvalidArgument { provider, .. }
            | GeocodeError::Transport { provider, .. }
            | GeocodeError::DeadlineExceeded { provider, .. } => provider,
        }
    }

    /// Sanitized description of the attempted request.
    pub fn request(&self) -> &str {
        match self {
            GeocodeError::UnsupportedOperation { request, .. }
            | GeocodeError::InvalidCredentials { request, .. }
            | GeocodeError::QuotaExceeded { request, .. }
            | GeocodeError::NoResult { request, .. }
            | GeocodeError::InvalidArgument { request, .. }
            | GeocodeError::Transport { request, .. }
            | GeocodeError::DeadlineExceeded { request, .. } => request,
        }
    }

    /// Per-provider attempts recorded by a chain; empty for direct calls.
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            GeocodeError::NoResult { attempts, .. } => attempts,
            _ => &[],
        }
    }

    /// Names of chain members that rejected their credentials.
    pub fn credential_failures(&self) -> Vec<&str> {
        self.attempts()
            .iter()
            .filter(|a| a.failed_with(ErrorKind::InvalidCredentials))
            .map(|a| a.provider.as_str())
            .collect()
    }
}

/// What happened when the chain considered one provider.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The provider's capabilities exclude the request; it was not called.
    Skipped,
    /// The provider answered with an empty collection.
    Empty,
    Failed(GeocodeError),
}

/// Diagnostic record of one provider in a chain call.
#[derive(Debug)]
pub struct Attempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
}

impl Attempt {
    pub fn skipped(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            outcome: AttemptOutcome::Skipped,
        }
    }

    pub fn empty(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            outcome: AttemptOutcome::Empty,
        }
    }

    pub fn failed(provider: &str, error: GeocodeError) -> Self {
        Self {
            provider: provider.to_string(),
            outcome: AttemptOutcome::Failed(error),
        }
    }

    pub fn error(&self) -> Option<&GeocodeError> {
        match &self.outcome {
            AttemptOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn failed_with(&self, kind: ErrorKind) -> bool {
        self.error().is_some_and(|e| e.kind() == kind)
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::Skipped => write!(f, "{}: skipped", self.provider),
            AttemptOutcome::Empty => write!(f, "{}: empty result", self.provider),
            AttemptOutcome::Failed(e) => write!(f, "{}", e),
        }
    }
}

struct AttemptSummary<'a>(&'a [Attempt]);

impl fmt::Display for AttemptSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        let tried = self
            .0
            .iter()
            .filter(|a| !matches!(a.outcome, AttemptOutcome::Skipped))
            .count();
        write!(f, " after trying {} provider(s)", tried)?;

        let rejected: Vec<&str> = self
            .0
            .iter()
            .filter(|a| a.failed_with(ErrorKind::InvalidCredentials))
            .map(|a| a.provider.as_str())
            .collect();
        if !rejected.is_empty() {
            write!(f, "; credentials rejected by: {}", rejected.join(", "))?;
        }

        for attempt in self.0 {
            write!(f, "\n  - {}", attempt)?;
        }
        Ok(())
    }
}
