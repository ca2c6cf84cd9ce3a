use thiserror::Error;

/// Top-level error type for the `ihc-api` crate.
///
/// Every failure a controller session can report falls into one of three
/// classes that drive recovery in `ihc-core`: timeouts (benign, retry
/// immediately), transport failures (session lost, reconnect) and
/// everything else (back off, retry later).
#[derive(Debug, Error)]
pub enum Error {
    // ── Timeouts ────────────────────────────────────────────────────
    /// A bounded wait elapsed without new data.
    #[error("Controller did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Transport ───────────────────────────────────────────────────
    /// Socket-level failure (connection refused, reset, broken pipe, ...).
    #[error("I/O error talking to controller: {0}")]
    Io(#[from] std::io::Error),

    /// The session was closed by the controller or never opened.
    #[error("Controller connection closed")]
    ConnectionClosed,

    // ── Session ─────────────────────────────────────────────────────
    /// Login failed (wrong credentials, account locked, ...).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The controller understood the request and refused it.
    #[error("Controller rejected request: {message}")]
    Rejected { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The controller answered with something we could not interpret.
    #[error("Malformed controller response: {message}")]
    Protocol { message: String },
}

impl Error {
    /// Returns `true` if a bounded wait simply ran out of time.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Returns `true` if the session is likely gone and reconnecting
    /// might resolve it.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() != std::io::ErrorKind::TimedOut,
            Self::ConnectionClosed => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_out_io_counts_as_timeout_not_transport() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "read"));
        assert!(err.is_timeout());
        assert!(!err.is_transport());
    }

    #[test]
    fn reset_connection_is_transport() {
        let err = Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(err.is_transport());
        assert!(!err.is_timeout());
        assert!(Error::ConnectionClosed.is_transport());
    }

    #[test]
    fn rejection_is_neither() {
        let err = Error::Rejected {
            message: "unknown resource".into(),
        };
        assert!(!err.is_timeout());
        assert!(!err.is_transport());
    }
}
