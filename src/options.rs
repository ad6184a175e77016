//! Configuration surface of the directory subsystem.
//!
//! The host application loads and resolves these values however it wants;
//! the core consumes them read-only. [`DirectoryOpts`] follows the chained
//! builder style used elsewhere in this library's lineage: construct with
//! the mandatory pieces, then override defaults with `with_*` methods.

use derive_more::Display;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How the connection to the directory endpoint is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransportMode {
    /// No transport security.
    #[display("plain")]
    Plain,
    /// TLS from the first byte (`ldaps://`).
    #[display("ssl")]
    Ssl,
    /// Plain connect followed by an in-band STARTTLS upgrade.
    #[display("starttls")]
    StartTls,
}

/// Which protocol stack talks to the directory.
///
/// Both backends satisfy the identical open/bind/search/close contract, so
/// everything above the [`DirectoryBackend`](crate::backend::DirectoryBackend)
/// seam is backend-agnostic. The selection is made once, from configuration;
/// there is no runtime inspection of the active implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BackendKind {
    /// The retained blocking protocol implementation, driven on worker
    /// threads.
    #[display("legacy")]
    Legacy,
    /// The async directory-service implementation.
    #[display("modern")]
    Modern,
}

/// How presented credentials are checked against the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStrategy {
    /// Bind directly as the presented DN; success implies valid credentials.
    DirectBind,
    /// Search for the entry matching the login attribute using the service
    /// account, then re-bind as the found DN to confirm the secret.
    SearchThenBind,
}

/// Which convention the directory uses to record group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipSchema {
    /// Groups carry a member-list attribute (e.g. `member` on
    /// `groupOfNames`). Membership is found by searching groups for the
    /// subject's DN.
    MemberOnGroup,
    /// Entries carry the inverse attribute (e.g. `memberOf`) listing the
    /// groups they belong to.
    MemberOfOnUser,
}

/// Network location and transport security of a directory server.
///
/// Immutable once a connection has been opened from it.
#[derive(Debug, Clone)]
pub struct DirectoryEndpoint {
    /// Directory host name or address.
    pub host: String,
    /// Directory port.
    pub port: u16,
    /// Transport security mode.
    pub transport: TransportMode,
    /// Optional path to PEM key material (trusted root certificates) used
    /// for the TLS transports.
    pub key_material: Option<PathBuf>,
}

impl DirectoryEndpoint {
    /// Creates a plain-transport endpoint for the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        DirectoryEndpoint {
            host: host.into(),
            port,
            transport: TransportMode::Plain,
            key_material: None,
        }
    }

    /// Sets the transport mode.
    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the path to the PEM key material used to verify the server.
    pub fn with_key_material(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_material = Some(path.into());
        self
    }

    /// The protocol URL for this endpoint.
    pub(crate) fn url(&self) -> String {
        match self.transport {
            TransportMode::Ssl => format!("ldaps://{}:{}", self.host, self.port),
            _ => format!("ldap://{}:{}", self.host, self.port),
        }
    }
}

/// One directory-attribute to profile-field projection.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    /// The directory attribute to read.
    pub attribute: String,
    /// The host profile field to fill.
    pub field: String,
    /// Copy all values when true, only the first value otherwise.
    pub multi_valued: bool,
}

impl FieldMapping {
    /// Maps the first value of `attribute` onto `field`.
    pub fn single(attribute: impl Into<String>, field: impl Into<String>) -> Self {
        FieldMapping {
            attribute: attribute.into(),
            field: field.into(),
            multi_valued: false,
        }
    }

    /// Maps all values of `attribute` onto `field`.
    pub fn multi(attribute: impl Into<String>, field: impl Into<String>) -> Self {
        FieldMapping {
            attribute: attribute.into(),
            field: field.into(),
            multi_valued: true,
        }
    }
}

/// Fully resolved configuration for the directory subsystem.
#[derive(Clone)]
pub struct DirectoryOpts {
    /// Where the directory lives and how to reach it.
    pub endpoint: DirectoryEndpoint,
    /// Which protocol stack to use.
    pub backend: BackendKind,
    /// How credentials are validated.
    pub bind_strategy: BindStrategy,
    /// DN of the service account used for searches and search-then-bind.
    pub service_dn: String,
    /// Secret of the service account.
    pub service_secret: String,
    /// Attribute matched against the presented login in search-then-bind
    /// (e.g. `uid`).
    pub login_attribute: String,
    /// Base DN under which user entries are searched.
    pub user_base_dn: String,
    /// Base DN under which group entries are searched.
    pub group_base_dn: String,
    /// Filter restricting which entries count as groups, already
    /// parenthesized (e.g. `(objectClass=groupOfNames)`).
    pub group_filter: String,
    /// The member-list attribute on groups.
    pub membership_attribute: String,
    /// The inverse membership attribute on entries.
    pub member_of_attribute: String,
    /// Which membership convention the directory uses.
    pub membership_schema: MembershipSchema,
    /// Directory-attribute to profile-field projections.
    pub field_mappings: Vec<FieldMapping>,
    /// How long resolved membership sets stay valid in the cache.
    pub cache_ttl: Duration,
    /// Maximum number of nesting hops followed during group resolution.
    /// Groups beyond this bound are treated as not-a-member.
    pub max_group_depth: u32,
    /// Timeout applied to every directory round trip.
    pub timeout: Duration,
}

impl DirectoryOpts {
    /// Creates a configuration for the given endpoint with defaults:
    /// modern backend, search-then-bind over `uid`, `groupOfNames`/`member`
    /// membership, a 6 hour cache TTL, 10 hop traversal bound and a 30
    /// second operation timeout.
    pub fn new(endpoint: DirectoryEndpoint) -> Self {
        DirectoryOpts {
            endpoint,
            backend: BackendKind::Modern,
            bind_strategy: BindStrategy::SearchThenBind,
            service_dn: String::new(),
            service_secret: String::new(),
            login_attribute: "uid".to_string(),
            user_base_dn: String::new(),
            group_base_dn: String::new(),
            group_filter: "(objectClass=groupOfNames)".to_string(),
            membership_attribute: "member".to_string(),
            member_of_attribute: "memberOf".to_string(),
            membership_schema: MembershipSchema::MemberOnGroup,
            field_mappings: Vec::new(),
            cache_ttl: Duration::from_secs(21600),
            max_group_depth: 10,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the protocol backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the credential validation strategy.
    pub fn with_bind_strategy(mut self, strategy: BindStrategy) -> Self {
        self.bind_strategy = strategy;
        self
    }

    /// Sets the service account used for searches.
    pub fn with_service_account(
        mut self,
        dn: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.service_dn = dn.into();
        self.service_secret = secret.into();
        self
    }

    /// Sets the login attribute used by search-then-bind.
    pub fn with_login_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.login_attribute = attribute.into();
        self
    }

    /// Sets the base DNs for user and group searches.
    pub fn with_base_dns(
        mut self,
        user_base: impl Into<String>,
        group_base: impl Into<String>,
    ) -> Self {
        self.user_base_dn = user_base.into();
        self.group_base_dn = group_base.into();
        self
    }

    /// Sets the group filter (already parenthesized).
    pub fn with_group_filter(mut self, filter: impl Into<String>) -> Self {
        self.group_filter = filter.into();
        self
    }

    /// Sets the membership convention and the attribute names it reads.
    pub fn with_membership_schema(
        mut self,
        schema: MembershipSchema,
        membership_attribute: impl Into<String>,
        member_of_attribute: impl Into<String>,
    ) -> Self {
        self.membership_schema = schema;
        self.membership_attribute = membership_attribute.into();
        self.member_of_attribute = member_of_attribute.into();
        self
    }

    /// Sets the attribute-to-profile-field projections.
    pub fn with_field_mappings(mut self, mappings: Vec<FieldMapping>) -> Self {
        self.field_mappings = mappings;
        self
    }

    /// Sets how long cached membership sets stay valid.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the traversal depth bound.
    pub fn with_max_group_depth(mut self, depth: u32) -> Self {
        self.max_group_depth = depth;
        self
    }

    /// Sets the per-round-trip timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// The service secret never appears in logs.
impl fmt::Debug for DirectoryOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryOpts")
            .field("endpoint", &self.endpoint)
            .field("backend", &self.backend)
            .field("bind_strategy", &self.bind_strategy)
            .field("service_dn", &self.service_dn)
            .field("service_secret", &"***")
            .field("login_attribute", &self.login_attribute)
            .field("user_base_dn", &self.user_base_dn)
            .field("group_base_dn", &self.group_base_dn)
            .field("group_filter", &self.group_filter)
            .field("membership_schema", &self.membership_schema)
            .field("cache_ttl", &self.cache_ttl)
            .field("max_group_depth", &self.max_group_depth)
            .field("timeout", &self.timeout)
            .finish()
    }
}
