//! The top-level orchestrator consumed by the host's login flow.

use crate::backend::{DirectoryBackend, SearchScope, backend_for};
use crate::cache::{CacheScope, MembershipCache};
use crate::connection::ConnectionManager;
use crate::entry::{AuthResult, Credential, GroupEntry, UserEntry};
use crate::error::DirectoryError;
use crate::groups::GroupResolver;
use crate::mapper::map_profile;
use crate::options::DirectoryOpts;
use crate::report::ErrorReporter;
use crate::validate::CredentialValidator;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Authenticates users against the configured directory and resolves their
/// group memberships.
///
/// One login request runs connect → validate → resolve → map, strictly
/// sequentially on the caller's task, and the connection is released on
/// every exit path, success or failure. Failures never cross this boundary
/// as panics; they are always one of the [`DirectoryError`] kinds, and the
/// most recent one can be re-read through [`DirectoryAuthenticator::last_error`].
pub struct DirectoryAuthenticator {
    opts: DirectoryOpts,
    manager: ConnectionManager,
    validator: CredentialValidator,
    resolver: GroupResolver,
    cache: Arc<MembershipCache>,
    reporter: Arc<ErrorReporter>,
}

impl DirectoryAuthenticator {
    /// Creates an authenticator using the backend named by the
    /// configuration. The membership cache is owned by the caller and
    /// passed in; its lifecycle (startup, external resets, shutdown)
    /// belongs to the host.
    pub fn new(opts: DirectoryOpts, cache: Arc<MembershipCache>) -> Self {
        let backend = backend_for(opts.backend);
        Self::with_backend(opts, cache, backend)
    }

    /// Creates an authenticator over an explicit backend implementation.
    pub fn with_backend(
        opts: DirectoryOpts,
        cache: Arc<MembershipCache>,
        backend: Arc<dyn DirectoryBackend>,
    ) -> Self {
        let reporter = Arc::new(ErrorReporter::new());
        let manager = ConnectionManager::new(&opts, backend);
        let validator = CredentialValidator::new(&opts);
        let resolver = GroupResolver::new(&opts, Arc::clone(&reporter));
        DirectoryAuthenticator {
            opts,
            manager,
            validator,
            resolver,
            cache,
            reporter,
        }
    }

    /// Authenticates the credential and, on success, resolves the user's
    /// groups (from cache when fresh) and maps the profile fields.
    #[tracing_attributes::instrument(skip(self, credential), fields(login = %credential.login))]
    pub async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<AuthResult, DirectoryError> {
        self.reporter.clear();
        match self.authenticate_inner(credential).await {
            Ok(result) => {
                info!(user_dn = %result.user.dn, groups = result.groups.len(), "authentication succeeded");
                Ok(result)
            }
            Err(e) => {
                self.reporter.record(&e);
                Err(e)
            }
        }
    }

    async fn authenticate_inner(
        &self,
        credential: &Credential,
    ) -> Result<AuthResult, DirectoryError> {
        let (user, mut conn) = self.validator.validate(&self.manager, credential).await?;

        let groups = if let Some(hit) = self.cache.get(&user.dn) {
            debug!(user_dn = %user.dn, "membership served from cache");
            conn.close().await;
            (*hit).clone()
        } else {
            let resolved = self
                .resolver
                .resolve(&mut conn, &user, self.opts.max_group_depth)
                .await;
            conn.close().await;
            let resolved = resolved?;
            self.cache.put(&user.dn, resolved.clone());
            resolved
        };

        let profile = map_profile(&user, &self.opts.field_mappings);
        Ok(AuthResult {
            user,
            groups,
            profile,
        })
    }

    /// Re-resolves the groups of an already-known subject DN without
    /// re-authenticating. Served from the cache when fresh.
    #[tracing_attributes::instrument(skip(self))]
    pub async fn resolve_groups(
        &self,
        subject_dn: &str,
    ) -> Result<HashSet<GroupEntry>, DirectoryError> {
        self.reporter.clear();
        if let Some(hit) = self.cache.get(subject_dn) {
            debug!(subject_dn, "membership served from cache");
            return Ok((*hit).clone());
        }
        match self.resolve_groups_inner(subject_dn).await {
            Ok(groups) => Ok(groups),
            Err(e) => {
                self.reporter.record(&e);
                Err(e)
            }
        }
    }

    async fn resolve_groups_inner(
        &self,
        subject_dn: &str,
    ) -> Result<HashSet<GroupEntry>, DirectoryError> {
        let mut conn = self.manager.open_service().await?;

        // The inverse membership attribute is operational on many servers
        // and not covered by `*`, so it is requested by name.
        let attrs = ["*", self.opts.member_of_attribute.as_str()];
        let user = match conn
            .search(subject_dn, SearchScope::Base, "(objectClass=*)", &attrs)
            .await
        {
            Ok(entries) => match entries.into_iter().next() {
                Some(entry) => UserEntry::from_entry(entry),
                None => {
                    conn.close().await;
                    return Err(DirectoryError::new(format!(
                        "no directory entry for {subject_dn}"
                    )));
                }
            },
            Err(e) => {
                conn.close().await;
                return Err(e);
            }
        };

        let resolved = self
            .resolver
            .resolve(&mut conn, &user, self.opts.max_group_depth)
            .await;
        conn.close().await;
        let groups = resolved?;
        self.cache.put(subject_dn, groups.clone());
        Ok(groups)
    }

    /// Probes the directory: opens a connection with the given bind
    /// credentials and releases it again. Failures are recorded, not
    /// raised.
    pub async fn check_connection(&self, bind_dn: &str, secret: &str) -> bool {
        self.reporter.clear();
        match self.manager.open(bind_dn, secret).await {
            Ok(mut conn) => {
                conn.close().await;
                true
            }
            Err(e) => {
                self.reporter.record(&e);
                false
            }
        }
    }

    /// Drops cached memberships for one subject, or everything.
    pub fn invalidate_cache(&self, scope: CacheScope) {
        match scope {
            CacheScope::Subject(dn) => self.cache.invalidate(&dn),
            CacheScope::All => self.cache.reset_all(),
        }
    }

    /// External "directory changed" hook. An out-of-band group edit cannot
    /// be attributed to specific subjects, so the whole cache is reset.
    pub fn directory_changed(&self) {
        info!("directory change signalled, resetting membership cache");
        self.cache.reset_all();
    }

    /// The most recent failure recorded by this authenticator, if any.
    pub fn last_error(&self) -> Option<DirectoryError> {
        self.reporter.last()
    }
}

impl std::fmt::Debug for DirectoryAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryAuthenticator")
            .field("opts", &self.opts)
            .finish()
    }
}
