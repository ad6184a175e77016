//! Opening, binding and releasing directory sessions.

use crate::backend::{DirectoryBackend, DirectoryEntry, DirectorySession, SearchScope};
use crate::error::DirectoryError;
use crate::options::{DirectoryEndpoint, DirectoryOpts};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// An open, bound session to one directory endpoint.
///
/// Owns the underlying protocol session exclusively. Must be released with
/// [`Connection::close`]; any operation after release fails with
/// [`DirectoryError::ConnectionClosed`]. `close` is idempotent and never
/// fails.
pub struct Connection {
    session: Option<Box<dyn DirectorySession>>,
    bound_dn: String,
}

impl Connection {
    fn new(session: Box<dyn DirectorySession>, bound_dn: String) -> Self {
        Connection {
            session: Some(session),
            bound_dn,
        }
    }

    /// Whether the connection has not been released yet.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// The DN this connection is bound as.
    pub fn bound_dn(&self) -> &str {
        &self.bound_dn
    }

    /// Runs a search over this connection.
    pub async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let session = self
            .session
            .as_mut()
            .ok_or(DirectoryError::ConnectionClosed)?;
        session.search(base, scope, filter, attrs).await
    }

    /// Releases the connection. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
            debug!(bound_dn = %self.bound_dn, "connection released");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("bound_dn", &self.bound_dn)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Opens and releases connections against one configured endpoint.
///
/// `open` performs, in order: network connect bounded by the configured
/// timeout, transport upgrade when the endpoint requires one, then a bind
/// with the supplied credentials. Each stage failure is typed
/// (`ConnectFailed` / `TlsFailed` / `BindFailed`), and a session whose bind
/// fails is closed before the error is returned, so no half-open socket
/// survives the failure path.
#[derive(Clone)]
pub struct ConnectionManager {
    backend: Arc<dyn DirectoryBackend>,
    endpoint: DirectoryEndpoint,
    service_dn: String,
    service_secret: String,
    timeout: Duration,
}

impl ConnectionManager {
    /// Creates a manager for the configured endpoint using the given
    /// backend implementation.
    pub fn new(opts: &DirectoryOpts, backend: Arc<dyn DirectoryBackend>) -> Self {
        ConnectionManager {
            backend,
            endpoint: opts.endpoint.clone(),
            service_dn: opts.service_dn.clone(),
            service_secret: opts.service_secret.clone(),
            timeout: opts.timeout,
        }
    }

    /// Opens a connection bound as the given DN.
    #[tracing_attributes::instrument(skip(self, secret))]
    pub async fn open(&self, bind_dn: &str, secret: &str) -> Result<Connection, DirectoryError> {
        let mut session = self.backend.connect(&self.endpoint, self.timeout).await?;
        if let Err(e) = session.bind(bind_dn, secret).await {
            // No leaks on the failure path.
            session.close().await;
            return Err(e);
        }
        debug!(bind_dn = %bind_dn, "connection opened and bound");
        Ok(Connection::new(session, bind_dn.to_string()))
    }

    /// Opens a connection bound as the configured service account.
    pub async fn open_service(&self) -> Result<Connection, DirectoryError> {
        self.open(&self.service_dn, &self.service_secret).await
    }
}

// The service secret never appears in logs.
impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("service_dn", &self.service_dn)
            .field("timeout", &self.timeout)
            .finish()
    }
}
