//! Data carried between the directory and the host application.

use crate::backend::DirectoryEntry;
use std::collections::HashMap;
use std::fmt;

/// A presented login identity plus secret.
///
/// The login is either a distinguished name (direct bind) or a login
/// attribute value (search-then-bind). The secret is used for the validation
/// round trip and never persisted.
#[derive(Clone)]
pub struct Credential {
    /// Login DN or login attribute value.
    pub login: String,
    /// The presented secret.
    pub secret: String,
}

impl Credential {
    /// Creates a credential from a login and secret.
    pub fn new(login: impl Into<String>, secret: impl Into<String>) -> Self {
        Credential {
            login: login.into(),
            secret: secret.into(),
        }
    }
}

// The secret never appears in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("secret", &"***")
            .finish()
    }
}

/// An immutable snapshot of a directory user entry at resolution time.
///
/// Attribute names are normalized to lowercase on construction; LDAP treats
/// them case-insensitively (RFC 4512).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    /// The resolved distinguished name.
    pub dn: String,
    attrs: HashMap<String, Vec<String>>,
}

impl UserEntry {
    /// Creates a user entry from a raw directory entry.
    pub fn from_entry(entry: DirectoryEntry) -> Self {
        let attrs = entry
            .attrs
            .into_iter()
            .map(|(name, values)| (name.to_lowercase(), values))
            .collect();
        UserEntry { dn: entry.dn, attrs }
    }

    /// The first value of the given attribute, if present.
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attrs
            .get(&attribute.to_lowercase())
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values of the given attribute. Empty when absent.
    pub fn all(&self, attribute: &str) -> &[String] {
        self.attrs
            .get(&attribute.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A group entry: its distinguished name plus its direct member DNs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupEntry {
    /// The group's distinguished name.
    pub dn: String,
    /// The group's direct member DNs, as recorded on the group entry.
    /// Empty under the memberOf convention when the directory does not
    /// expose a member list.
    pub members: Vec<String>,
}

impl GroupEntry {
    /// Creates a group entry.
    pub fn new(dn: impl Into<String>, members: Vec<String>) -> Self {
        GroupEntry {
            dn: dn.into(),
            members,
        }
    }
}

/// The outcome of a successful authentication.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The validated user entry.
    pub user: UserEntry,
    /// The transitive closure of the user's group memberships, bounded by
    /// the configured traversal depth.
    pub groups: std::collections::HashSet<GroupEntry>,
    /// The user's directory attributes projected onto host profile fields.
    pub profile: crate::mapper::Profile,
}

/// Lowercased form of a DN, used as cache and visited-set key. LDAP DNs
/// compare case-insensitively.
pub(crate) fn normalize_dn(dn: &str) -> String {
    dn.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry() -> DirectoryEntry {
        let mut attrs = HashMap::new();
        attrs.insert("cn".to_string(), vec!["Alice Price".to_string()]);
        attrs.insert(
            "memberOf".to_string(),
            vec!["cn=eng,ou=groups,dc=example,dc=com".to_string()],
        );
        DirectoryEntry {
            dn: "uid=alice,ou=people,dc=example,dc=com".to_string(),
            attrs,
        }
    }

    #[test]
    fn attribute_lookup_is_case_insensitive() {
        let user = UserEntry::from_entry(entry());
        assert_eq!(user.first("CN"), Some("Alice Price"));
        assert_eq!(user.all("memberof").len(), 1);
        assert_eq!(user.first("mail"), None);
        assert!(user.all("mail").is_empty());
    }

    #[test]
    fn credential_debug_hides_secret() {
        let cred = Credential::new("alice", "s3cret");
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("s3cret"));
    }
}
