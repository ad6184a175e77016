//! Credential validation strategies.

use crate::backend::{SearchScope, escape_filter_value};
use crate::connection::{Connection, ConnectionManager};
use crate::entry::{Credential, UserEntry};
use crate::error::DirectoryError;
use crate::options::{BindStrategy, DirectoryOpts};
use tracing::debug;

/// Validates a presented identity and secret against the directory using
/// the configured [`BindStrategy`].
///
/// Validation has no side effects beyond the directory round trips; in
/// particular it never touches the membership cache. On success it hands
/// back the resolved [`UserEntry`] together with an open connection the
/// caller can reuse for group resolution (and must release).
#[derive(Debug)]
pub struct CredentialValidator {
    strategy: BindStrategy,
    login_attribute: String,
    user_base_dn: String,
    member_of_attribute: String,
}

impl CredentialValidator {
    /// Creates a validator from the resolved configuration.
    pub fn new(opts: &DirectoryOpts) -> Self {
        CredentialValidator {
            strategy: opts.bind_strategy,
            login_attribute: opts.login_attribute.clone(),
            user_base_dn: opts.user_base_dn.clone(),
            member_of_attribute: opts.member_of_attribute.clone(),
        }
    }

    /// Attribute selection for user entry fetches. The inverse membership
    /// attribute is operational on many servers (e.g. OpenLDAP's memberof
    /// overlay) and not covered by `*`, so it is requested by name.
    fn user_attrs(&self) -> [&str; 2] {
        ["*", self.member_of_attribute.as_str()]
    }

    /// Validates the credential and returns the matched entry plus the
    /// connection used, still open and usable for follow-up searches.
    #[tracing_attributes::instrument(skip(self, manager, credential), fields(login = %credential.login))]
    pub async fn validate(
        &self,
        manager: &ConnectionManager,
        credential: &Credential,
    ) -> Result<(UserEntry, Connection), DirectoryError> {
        // An empty secret would be an unauthenticated bind, which most
        // directories report as success. Reject it before any round trip.
        if credential.secret.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }

        match self.strategy {
            BindStrategy::DirectBind => self.direct_bind(manager, credential).await,
            BindStrategy::SearchThenBind => self.search_then_bind(manager, credential).await,
        }
    }

    /// Binds as the presented DN; a successful bind implies the secret is
    /// valid. The entry is then fetched over the same, now authenticated,
    /// connection.
    async fn direct_bind(
        &self,
        manager: &ConnectionManager,
        credential: &Credential,
    ) -> Result<(UserEntry, Connection), DirectoryError> {
        let mut conn = match manager.open(&credential.login, &credential.secret).await {
            Ok(conn) => conn,
            Err(DirectoryError::BindFailed(reason)) => {
                debug!(reason = %reason, "direct bind rejected");
                return Err(DirectoryError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        let entries = match conn
            .search(
                &credential.login,
                SearchScope::Base,
                "(objectClass=*)",
                &self.user_attrs(),
            )
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        };

        match entries.into_iter().next() {
            Some(entry) => Ok((UserEntry::from_entry(entry), conn)),
            None => {
                conn.close().await;
                Err(DirectoryError::InvalidCredentials)
            }
        }
    }

    /// Searches for the entry matching the login attribute using the
    /// service account, then confirms the secret by binding a fresh
    /// connection as the found DN. Zero or multiple matches is an
    /// ambiguous identity, never a guess.
    async fn search_then_bind(
        &self,
        manager: &ConnectionManager,
        credential: &Credential,
    ) -> Result<(UserEntry, Connection), DirectoryError> {
        let mut conn = manager.open_service().await?;

        let filter = format!(
            "({}={})",
            self.login_attribute,
            escape_filter_value(&credential.login)
        );
        let mut entries = match conn
            .search(
                &self.user_base_dn,
                SearchScope::Subtree,
                &filter,
                &self.user_attrs(),
            )
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        };

        if entries.len() != 1 {
            let matches = entries.len();
            debug!(matches, filter = %filter, "login filter did not match exactly one entry");
            conn.close().await;
            return Err(DirectoryError::AmbiguousIdentity { matches });
        }
        let entry = entries.remove(0);

        // Confirm the secret with a separate bind as the found DN.
        match manager.open(&entry.dn, &credential.secret).await {
            Ok(mut user_conn) => user_conn.close().await,
            Err(DirectoryError::BindFailed(reason)) => {
                debug!(dn = %entry.dn, reason = %reason, "secret confirmation bind rejected");
                conn.close().await;
                return Err(DirectoryError::InvalidCredentials);
            }
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        }

        Ok((UserEntry::from_entry(entry), conn))
    }
}
