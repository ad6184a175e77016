//! The service provider interface (SPI) for directory protocol backends.
//!
//! Two interchangeable implementations ship with the library: the modern
//! async stack ([`modern::ModernBackend`]) and the retained blocking stack
//! ([`legacy::LegacyBackend`]), selected once at configuration time through
//! [`BackendKind`](crate::options::BackendKind). Everything above this seam
//! (credential validation, group resolution) only sees the traits below, so
//! the rest of the system is backend-agnostic.

pub mod legacy;
pub mod modern;
mod tls;

use crate::error::DirectoryError;
use crate::options::{BackendKind, DirectoryEndpoint, TransportMode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The scope of a directory search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The base object only.
    Base,
    /// Immediate children of the base object.
    One,
    /// The base object and its whole subtree.
    Subtree,
}

/// One entry as returned by the wire protocol, before any projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// The entry's distinguished name.
    pub dn: String,
    /// Attribute name to values, as sent by the server.
    pub attrs: HashMap<String, Vec<String>>,
}

/// Factory for protocol sessions against one directory endpoint.
///
/// `connect` performs the network connect (bounded by `timeout`) and the
/// transport upgrade when the endpoint is configured for SSL or STARTTLS.
/// A failure at either stage yields a typed error and must not leave a
/// half-open socket behind.
#[async_trait]
pub trait DirectoryBackend: Send + Sync + std::fmt::Debug {
    /// Opens an unauthenticated protocol session to the endpoint.
    async fn connect(
        &self,
        endpoint: &DirectoryEndpoint,
        timeout: Duration,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// An open protocol session. All backends satisfy the identical
/// bind/search/close contract.
#[async_trait]
pub trait DirectorySession: Send {
    /// Authenticates the session as the given DN.
    async fn bind(&mut self, dn: &str, secret: &str) -> Result<(), DirectoryError>;

    /// Runs a search and returns the matching entries. A search whose base
    /// object does not exist returns an empty result rather than an error.
    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Releases the session. Infallible; errors during teardown are logged
    /// and swallowed.
    async fn close(&mut self);
}

/// Resolves the configured backend selector to a concrete implementation.
pub fn backend_for(kind: BackendKind) -> Arc<dyn DirectoryBackend> {
    match kind {
        BackendKind::Legacy => Arc::new(legacy::LegacyBackend),
        BackendKind::Modern => Arc::new(modern::ModernBackend),
    }
}

/// Escapes a value for embedding in a search filter (RFC 4515). Applied to
/// every user-supplied value interpolated into a filter.
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

/// Classifies a connect-phase protocol error into the connect/TLS stages.
/// The protocol library reports both through one error type; on a TLS
/// transport, handshake and certificate faults become [`DirectoryError::TlsFailed`].
pub(crate) fn classify_connect_error(
    transport: TransportMode,
    err: ldap3::LdapError,
) -> DirectoryError {
    let msg = err.to_string();
    let tls_transport = matches!(transport, TransportMode::Ssl | TransportMode::StartTls);
    if tls_transport {
        let lower = msg.to_lowercase();
        if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake") {
            return DirectoryError::TlsFailed(msg);
        }
    }
    DirectoryError::ConnectFailed(msg)
}

/// Builds the protocol connection settings shared by both backends.
pub(crate) fn conn_settings(
    endpoint: &DirectoryEndpoint,
    timeout: Duration,
) -> Result<ldap3::LdapConnSettings, DirectoryError> {
    let mut settings = ldap3::LdapConnSettings::new().set_conn_timeout(timeout);
    if endpoint.transport == TransportMode::StartTls {
        settings = settings.set_starttls(true);
    }
    if endpoint.transport != TransportMode::Plain {
        if let Some(path) = &endpoint.key_material {
            settings = settings.set_config(tls::client_config(path)?);
        }
    }
    Ok(settings)
}

pub(crate) fn to_ldap_scope(scope: SearchScope) -> ldap3::Scope {
    match scope {
        SearchScope::Base => ldap3::Scope::Base,
        SearchScope::One => ldap3::Scope::OneLevel,
        SearchScope::Subtree => ldap3::Scope::Subtree,
    }
}

/// How a finished search relates to the entries it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchOutcome {
    /// The server returned every matching entry.
    Complete,
    /// The base object does not exist; matches nothing.
    MissingBase,
}

/// Maps a search result code onto the error taxonomy. A missing base object
/// (noSuchObject, rc 32) is an empty result, not a transport fault. A
/// truncated result set (sizeLimitExceeded, rc 4) is an error: an incomplete
/// entry list must never pass for the full membership picture, so the caller
/// either fails the operation or drops and records the affected branch.
pub(crate) fn classify_search_rc(rc: u32, text: &str) -> Result<SearchOutcome, DirectoryError> {
    match rc {
        0 => Ok(SearchOutcome::Complete),
        32 => Ok(SearchOutcome::MissingBase),
        4 => Err(DirectoryError::DirectoryUnavailable(format!(
            "search truncated by server size limit: {text}"
        ))),
        rc => Err(DirectoryError::DirectoryUnavailable(format!(
            "search failed with result code {rc}: {text}"
        ))),
    }
}

/// Maps a completed search into entries per [`classify_search_rc`].
pub(crate) fn entries_from_search(
    result: ldap3::SearchResult,
) -> Result<Vec<DirectoryEntry>, DirectoryError> {
    let ldap3::SearchResult(entries, res) = result;
    match classify_search_rc(res.rc, &res.text)? {
        SearchOutcome::MissingBase => Ok(Vec::new()),
        SearchOutcome::Complete => Ok(entries
            .into_iter()
            .map(|e| {
                let se = ldap3::SearchEntry::construct(e);
                DirectoryEntry {
                    dn: se.dn,
                    attrs: se.attrs,
                }
            })
            .collect()),
    }
}

/// Maps a bind result code onto the error taxonomy.
pub(crate) fn check_bind_result(res: ldap3::LdapResult) -> Result<(), DirectoryError> {
    if res.rc == 0 {
        Ok(())
    } else {
        Err(DirectoryError::BindFailed(format!(
            "result code {}: {}",
            res.rc, res.text
        )))
    }
}
