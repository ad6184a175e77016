//! The error type shared by all directory operations.

use thiserror::Error;

/// The error type for directory authentication and group resolution.
///
/// Every failure a caller can observe is one of these categories. Backends
/// and the orchestration layer never panic across the API boundary; they
/// classify protocol and transport faults into this taxonomy and propagate
/// them as values.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The network connection to the directory endpoint could not be
    /// established.
    #[error("could not connect to the directory: {0}")]
    ConnectFailed(String),

    /// The transport upgrade (SSL handshake or STARTTLS exchange) failed.
    #[error("TLS negotiation with the directory failed: {0}")]
    TlsFailed(String),

    /// The directory rejected the bind operation.
    #[error("directory rejected bind: {0}")]
    BindFailed(String),

    /// The presented identity/secret combination is not valid.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A search-then-bind lookup matched zero or more than one entry. The
    /// validator never picks an arbitrary match.
    #[error("login matched {matches} directory entries, expected exactly one")]
    AmbiguousIdentity {
        /// How many entries the login filter matched.
        matches: usize,
    },

    /// A timeout or transport error occurred mid-operation.
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// One group node could not be fetched during traversal. Non-fatal:
    /// the resolver drops the branch, records this through the
    /// [`ErrorReporter`](crate::report::ErrorReporter) and keeps going.
    #[error("could not expand group {group_dn}: {reason}")]
    PartialResolution {
        /// The group whose expansion failed.
        group_dn: String,
        /// Why the node could not be fetched.
        reason: String,
    },

    /// An operation was attempted on a connection that was already released.
    #[error("operation attempted on a released connection")]
    ConnectionClosed,

    /// A fault raised inside a backend implementation that does not fit the
    /// categories above.
    #[error("{0}")]
    ImplPropagated(
        String,
        #[source] Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ),
}

impl DirectoryError {
    /// Creates a new backend-propagated error with the given message.
    pub fn new(s: impl Into<String>) -> Self {
        DirectoryError::ImplPropagated(s.into(), None)
    }

    /// Creates a new backend-propagated error with a message and the error
    /// that caused it.
    pub fn with_source<E>(s: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DirectoryError::ImplPropagated(s.into(), Some(Box::new(source)))
    }

    /// A copy of this error suitable for the most-recent-error slot. The
    /// boxed source of [`DirectoryError::ImplPropagated`] is not cloneable,
    /// so the recorded copy keeps the message only.
    pub(crate) fn to_recorded(&self) -> DirectoryError {
        match self {
            DirectoryError::ConnectFailed(m) => DirectoryError::ConnectFailed(m.clone()),
            DirectoryError::TlsFailed(m) => DirectoryError::TlsFailed(m.clone()),
            DirectoryError::BindFailed(m) => DirectoryError::BindFailed(m.clone()),
            DirectoryError::InvalidCredentials => DirectoryError::InvalidCredentials,
            DirectoryError::AmbiguousIdentity { matches } => {
                DirectoryError::AmbiguousIdentity { matches: *matches }
            }
            DirectoryError::DirectoryUnavailable(m) => {
                DirectoryError::DirectoryUnavailable(m.clone())
            }
            DirectoryError::PartialResolution { group_dn, reason } => {
                DirectoryError::PartialResolution {
                    group_dn: group_dn.clone(),
                    reason: reason.clone(),
                }
            }
            DirectoryError::ConnectionClosed => DirectoryError::ConnectionClosed,
            DirectoryError::ImplPropagated(m, _) => DirectoryError::ImplPropagated(m.clone(), None),
        }
    }
}
