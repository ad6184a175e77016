//! The retained blocking protocol backend.
//!
//! Kept for parity with deployments still running the older synchronous
//! stack. Every operation is handed to a blocking worker thread and bounded
//! by the configured timeout; a timed-out operation is abandoned on its
//! worker, never awaited again.

use super::{
    DirectoryBackend, DirectoryEntry, DirectorySession, SearchScope, check_bind_result,
    classify_connect_error, conn_settings, entries_from_search, to_ldap_scope,
};
use crate::error::DirectoryError;
use crate::options::DirectoryEndpoint;
use async_trait::async_trait;
use ldap3::LdapConn;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Backend driving the blocking protocol implementation on worker threads.
#[derive(Debug, Default)]
pub struct LegacyBackend;

#[async_trait]
impl DirectoryBackend for LegacyBackend {
    async fn connect(
        &self,
        endpoint: &DirectoryEndpoint,
        timeout: Duration,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let url = endpoint.url();
        let settings = conn_settings(endpoint, timeout)?;
        let transport = endpoint.transport;

        debug!(url = %url, transport = %transport, "connecting to directory (legacy stack)");

        let conn = run_blocking(timeout, move || LdapConn::with_settings(settings, &url))
            .await?
            .map_err(|e| classify_connect_error(transport, e))?;

        Ok(Box::new(LegacySession {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        }))
    }
}

struct LegacySession {
    conn: Arc<Mutex<LdapConn>>,
    timeout: Duration,
}

fn lock_conn(conn: &Arc<Mutex<LdapConn>>) -> MutexGuard<'_, LdapConn> {
    match conn.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Runs `f` on a blocking worker, bounded by `timeout`.
async fn run_blocking<T, F>(timeout: Duration, f: F) -> Result<T, DirectoryError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Ok(joined) => joined.map_err(|e| DirectoryError::with_source("worker thread failed", e)),
        Err(_) => Err(DirectoryError::DirectoryUnavailable(format!(
            "operation timed out after {timeout:?}"
        ))),
    }
}

#[async_trait]
impl DirectorySession for LegacySession {
    async fn bind(&mut self, dn: &str, secret: &str) -> Result<(), DirectoryError> {
        let conn = Arc::clone(&self.conn);
        let dn = dn.to_string();
        let secret = secret.to_string();
        let res = run_blocking(self.timeout, move || {
            lock_conn(&conn).simple_bind(&dn, &secret)
        })
        .await?
        .map_err(|e| DirectoryError::DirectoryUnavailable(e.to_string()))?;
        check_bind_result(res)
    }

    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let conn = Arc::clone(&self.conn);
        let base = base.to_string();
        let filter = filter.to_string();
        let attrs: Vec<String> = attrs.iter().map(|a| a.to_string()).collect();
        let ldap_scope = to_ldap_scope(scope);
        let result = run_blocking(self.timeout, move || {
            lock_conn(&conn).search(&base, ldap_scope, &filter, attrs)
        })
        .await?
        .map_err(|e| DirectoryError::DirectoryUnavailable(e.to_string()))?;
        entries_from_search(result)
    }

    async fn close(&mut self) {
        let conn = Arc::clone(&self.conn);
        let res = run_blocking(self.timeout, move || lock_conn(&conn).unbind()).await;
        match res {
            Ok(Err(e)) => debug!(error = %e, "error during unbind, dropping session anyway"),
            Err(e) => warn!(error = %e, "could not release legacy session cleanly"),
            Ok(Ok(())) => {}
        }
    }
}
