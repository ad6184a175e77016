//! The async directory-service backend.

use super::{
    DirectoryBackend, DirectoryEntry, DirectorySession, SearchScope, check_bind_result,
    classify_connect_error, conn_settings, entries_from_search, to_ldap_scope,
};
use crate::error::DirectoryError;
use crate::options::DirectoryEndpoint;
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync};
use std::time::Duration;
use tracing::{debug, warn};

/// Backend that speaks the protocol natively async.
#[derive(Debug, Default)]
pub struct ModernBackend;

#[async_trait]
impl DirectoryBackend for ModernBackend {
    async fn connect(
        &self,
        endpoint: &DirectoryEndpoint,
        timeout: Duration,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let url = endpoint.url();
        let settings = conn_settings(endpoint, timeout)?;

        debug!(url = %url, transport = %endpoint.transport, "connecting to directory");

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| classify_connect_error(endpoint.transport, e))?;

        // The connection component multiplexes the socket until dropped.
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "directory connection driver terminated");
            }
        });

        Ok(Box::new(ModernSession { ldap, timeout }))
    }
}

struct ModernSession {
    ldap: Ldap,
    timeout: Duration,
}

#[async_trait]
impl DirectorySession for ModernSession {
    async fn bind(&mut self, dn: &str, secret: &str) -> Result<(), DirectoryError> {
        let timeout = self.timeout;
        let fut = self.ldap.simple_bind(dn, secret);
        let res = match tokio::time::timeout(timeout, fut).await {
            Ok(res) => res.map_err(|e| DirectoryError::DirectoryUnavailable(e.to_string()))?,
            Err(_) => {
                return Err(DirectoryError::DirectoryUnavailable(format!(
                    "bind timed out after {timeout:?}"
                )));
            }
        };
        check_bind_result(res)
    }

    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let timeout = self.timeout;
        let fut = self
            .ldap
            .search(base, to_ldap_scope(scope), filter, attrs.to_vec());
        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(res) => res.map_err(|e| DirectoryError::DirectoryUnavailable(e.to_string()))?,
            Err(_) => {
                return Err(DirectoryError::DirectoryUnavailable(format!(
                    "search timed out after {timeout:?}"
                )));
            }
        };
        entries_from_search(result)
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!(error = %e, "error during unbind, dropping session anyway");
        }
    }
}
