//! libdirauth: authenticate application users against an LDAP-style
//! directory and resolve their nested group memberships.
//!
//! The library is consumed by a host application's login and authorization
//! flow: given credentials it decides whether they are valid and which
//! group identities to grant; given a known subject DN it re-resolves
//! groups without re-authenticating, served from an invalidation-aware
//! cache.
//!
//! The pieces, leaves first:
//!
//! - [`backend`]: the protocol SPI and the two interchangeable
//!   implementations (modern async, retained legacy blocking), selected
//!   once at configuration time.
//! - [`connection`]: opening (connect, transport upgrade, bind), using
//!   and releasing sessions, with typed stage failures and no socket
//!   leaks on the failure path.
//! - [`validate`]: direct-bind and search-then-bind credential checks.
//! - [`groups`]: breadth-first traversal of the membership graph with
//!   cycle protection and a configurable depth bound.
//! - [`cache`]: TTL-based memoization of resolved membership sets.
//! - [`mapper`]: projection of directory attributes onto host profile
//!   fields.
//! - [`report`]: the most-recent-failure slot for diagnostics.
//! - [`authenticator`]: the orchestrator tying it all together.
//!
//! # Example
//!
//! ```no_run
//! use libdirauth::{
//!     Credential, DirectoryAuthenticator, DirectoryEndpoint, DirectoryOpts, FieldMapping,
//!     MembershipCache, TransportMode,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), libdirauth::DirectoryError> {
//! let endpoint = DirectoryEndpoint::new("ldap.example.com", 636)
//!     .with_transport(TransportMode::Ssl)
//!     .with_key_material("/etc/ssl/ldap-roots.pem");
//!
//! let opts = DirectoryOpts::new(endpoint)
//!     .with_service_account("cn=svc,dc=example,dc=com", "service-secret")
//!     .with_base_dns("ou=people,dc=example,dc=com", "ou=groups,dc=example,dc=com")
//!     .with_field_mappings(vec![
//!         FieldMapping::single("cn", "full_name"),
//!         FieldMapping::single("mail", "email"),
//!     ]);
//!
//! let cache = Arc::new(MembershipCache::new(opts.cache_ttl));
//! let authenticator = DirectoryAuthenticator::new(opts, cache);
//!
//! let result = authenticator
//!     .authenticate(&Credential::new("alice", "alice-secret"))
//!     .await?;
//! println!("{} is in {} groups", result.user.dn, result.groups.len());
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod backend;
pub mod cache;
pub mod connection;
pub mod entry;
pub mod error;
pub mod groups;
pub mod mapper;
pub mod options;
pub mod report;
pub mod validate;

pub use authenticator::DirectoryAuthenticator;
pub use cache::{CacheScope, MembershipCache};
pub use connection::{Connection, ConnectionManager};
pub use entry::{AuthResult, Credential, GroupEntry, UserEntry};
pub use error::DirectoryError;
pub use mapper::Profile;
pub use options::{
    BackendKind, BindStrategy, DirectoryEndpoint, DirectoryOpts, FieldMapping, MembershipSchema,
    TransportMode,
};
