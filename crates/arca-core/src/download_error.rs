//! Download error wrapper
//!
//! Distinguishes recoverable download failures (network hiccups, timeouts)
//! from unrecoverable ones (source permanently refuses, max attempts). The
//! download manager downcasts to this type to decide whether a row is
//! deferred for retry or marked failed.

use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug)]
pub struct DownloadError {
    recoverable: bool,
    source: anyhow::Error,
}

impl DownloadError {
    /// A failure worth retrying with backoff (network, timeout, 5xx).
    pub fn recoverable(source: impl Into<anyhow::Error>) -> Self {
        Self {
            recoverable: true,
            source: source.into(),
        }
    }

    /// A permanent failure. The download is marked failed and never retried.
    pub fn unrecoverable(source: impl Into<anyhow::Error>) -> Self {
        Self {
            recoverable: false,
            source: source.into(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

impl Display for DownloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Extension trait to lift plain results into the download error domain.
pub trait DownloadResultExt<T> {
    fn recoverable(self) -> Result<T, DownloadError>;
    fn unrecoverable(self) -> Result<T, DownloadError>;
}

impl<T, E> DownloadResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn recoverable(self) -> Result<T, DownloadError> {
        self.map_err(DownloadError::recoverable)
    }

    fn unrecoverable(self) -> Result<T, DownloadError> {
        self.map_err(DownloadError::unrecoverable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_flag_round_trips() {
        let err = DownloadError::recoverable(anyhow::anyhow!("connection reset"));
        assert!(err.is_recoverable());

        let err = DownloadError::unrecoverable(anyhow::anyhow!("404 gone"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn downcast_from_anyhow() {
        let err: anyhow::Error = DownloadError::unrecoverable(anyhow::anyhow!("no")).into();
        let is_unrecoverable = err
            .downcast_ref::<DownloadError>()
            .map(|de| !de.is_recoverable())
            .unwrap_or(false);
        assert!(is_unrecoverable);
    }

    #[test]
    fn result_ext_wraps_errors() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        let err = result.recoverable().unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("boom"));
    }
}
