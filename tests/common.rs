//! In-memory mock directory shared by the integration tests.
//!
//! Implements the backend SPI over a programmable entry map so the tests can
//! exercise the full authenticate/resolve flow without a live server. The
//! mock understands exactly the filter shapes the library emits: a single
//! equality `(attr=value)` and a conjunction `(&(a=b)(c=d))`, with `*` as a
//! presence match. It also counts live sessions so tests can assert that no
//! connection survives a failure path.

#![allow(dead_code)]
#![allow(missing_docs)]

use async_trait::async_trait;
use libdirauth::backend::{DirectoryBackend, DirectoryEntry, DirectorySession, SearchScope};
use libdirauth::{DirectoryEndpoint, DirectoryError, DirectoryOpts, FieldMapping, GroupEntry};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a programmed connect failure presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    /// The TLS handshake fails (e.g. expired certificate).
    Tls,
    /// The TCP connect is refused.
    Refused,
}

#[derive(Debug, Default)]
struct MockState {
    /// normalized dn -> (dn as added, attrs)
    entries: Mutex<HashMap<String, (String, HashMap<String, Vec<String>>)>>,
    /// normalized dn -> secret
    passwords: Mutex<HashMap<String, String>>,
    /// normalized dns whose lookup or expansion times out
    broken: Mutex<HashSet<String>>,
    /// lowercased attribute names returned only when requested by name
    operational: Mutex<HashSet<String>>,
    connect_failure: Mutex<Option<ConnectFailure>>,
    live_sessions: AtomicUsize,
}

/// A programmable in-memory directory backend.
#[derive(Debug, Default)]
pub struct MockDirectory {
    state: Arc<MockState>,
}

impl MockDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(MockDirectory::default())
    }

    pub fn add_entry(&self, dn: &str, attrs: &[(&str, &[&str])]) {
        let attrs: HashMap<String, Vec<String>> = attrs
            .iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect();
        self.state
            .entries
            .lock()
            .unwrap()
            .insert(dn.to_lowercase(), (dn.to_string(), attrs));
    }

    pub fn set_password(&self, dn: &str, secret: &str) {
        self.state
            .passwords
            .lock()
            .unwrap()
            .insert(dn.to_lowercase(), secret.to_string());
    }

    /// Any search based on this DN, or filtering for it, times out.
    pub fn break_node(&self, dn: &str) {
        self.state.broken.lock().unwrap().insert(dn.to_lowercase());
    }

    /// Marks an attribute as operational: like a real server, the mock then
    /// excludes it from `*` and returns it only when requested by name.
    pub fn mark_operational(&self, attribute: &str) {
        self.state
            .operational
            .lock()
            .unwrap()
            .insert(attribute.to_lowercase());
    }

    /// Every subsequent connect attempt fails with the given failure.
    pub fn fail_connects(&self, failure: ConnectFailure) {
        *self.state.connect_failure.lock().unwrap() = Some(failure);
    }

    /// Connect attempts succeed again.
    pub fn restore_connects(&self) {
        *self.state.connect_failure.lock().unwrap() = None;
    }

    /// Number of sessions opened and not yet released.
    pub fn live_sessions(&self) -> usize {
        self.state.live_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryBackend for MockDirectory {
    async fn connect(
        &self,
        _endpoint: &DirectoryEndpoint,
        _timeout: Duration,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        if let Some(failure) = *self.state.connect_failure.lock().unwrap() {
            return Err(match failure {
                ConnectFailure::Tls => {
                    DirectoryError::TlsFailed("certificate has expired".to_string())
                }
                ConnectFailure::Refused => {
                    DirectoryError::ConnectFailed("connection refused".to_string())
                }
            });
        }
        self.state.live_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            released: false,
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
    released: bool,
}

#[async_trait]
impl DirectorySession for MockSession {
    async fn bind(&mut self, dn: &str, secret: &str) -> Result<(), DirectoryError> {
        let passwords = self.state.passwords.lock().unwrap();
        match passwords.get(&dn.to_lowercase()) {
            Some(expected) if expected == secret => Ok(()),
            _ => Err(DirectoryError::BindFailed(
                "result code 49: invalid credentials".to_string(),
            )),
        }
    }

    async fn search(
        &mut self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let base_key = base.to_lowercase();
        let conjuncts = parse_filter(filter);

        {
            let broken = self.state.broken.lock().unwrap();
            let filter_hits_broken = conjuncts.iter().any(|(_, v)| broken.contains(v));
            if broken.contains(&base_key) || filter_hits_broken {
                return Err(DirectoryError::DirectoryUnavailable(
                    "search timed out".to_string(),
                ));
            }
        }

        let operational = self.state.operational.lock().unwrap().clone();
        let wildcard = attrs.contains(&"*");

        let entries = self.state.entries.lock().unwrap();
        let mut out = Vec::new();
        for (key, (dn, entry_attrs)) in entries.iter() {
            let in_scope = match scope {
                SearchScope::Base => *key == base_key,
                SearchScope::One | SearchScope::Subtree => key.ends_with(&base_key),
            };
            if !in_scope {
                continue;
            }
            if !conjuncts.iter().all(|(a, v)| entry_matches(entry_attrs, a, v)) {
                continue;
            }
            // Filters evaluate against everything; the attribute selection
            // only shapes what comes back.
            let visible: HashMap<String, Vec<String>> = entry_attrs
                .iter()
                .filter(|(name, _)| {
                    let named = attrs.iter().any(|a| a.eq_ignore_ascii_case(name));
                    named || (wildcard && !operational.contains(&name.to_lowercase()))
                })
                .map(|(name, values)| (name.clone(), values.clone()))
                .collect();
            out.push(DirectoryEntry {
                dn: dn.clone(),
                attrs: visible,
            });
        }
        Ok(out)
    }

    async fn close(&mut self) {
        if !self.released {
            self.released = true;
            self.state.live_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Splits a filter into `(attribute, value)` conjuncts, lowercased.
fn parse_filter(filter: &str) -> Vec<(String, String)> {
    let trimmed = filter.trim();
    let inner = trimmed
        .strip_prefix("(&")
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);

    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '(' => {
                depth += 1;
                if depth == 1 {
                    current.clear();
                    continue;
                }
            }
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some((a, v)) = current.split_once('=') {
                        out.push((a.to_lowercase(), v.to_lowercase()));
                    }
                    continue;
                }
            }
            _ => {}
        }
        if depth >= 1 {
            current.push(c);
        }
    }
    out
}

fn entry_matches(attrs: &HashMap<String, Vec<String>>, attribute: &str, value: &str) -> bool {
    match attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(attribute))
    {
        None => false,
        Some((_, values)) => value == "*" || values.iter().any(|v| v.to_lowercase() == value),
    }
}

// Well-known fixture DNs.

pub const SVC_DN: &str = "cn=svc,dc=example,dc=com";
pub const SVC_SECRET: &str = "svc-secret";
pub const ALICE_DN: &str = "uid=alice,ou=people,dc=example,dc=com";
pub const ALICE_SECRET: &str = "alice-secret";
pub const ENG_DN: &str = "cn=eng,ou=groups,dc=example,dc=com";
pub const STAFF_DN: &str = "cn=staff,ou=groups,dc=example,dc=com";

/// A directory with a service account, one user (alice) and a two-level
/// group chain: alice in eng, eng in staff. Groups carry member lists.
pub fn nested_directory() -> Arc<MockDirectory> {
    let dir = MockDirectory::new();
    dir.add_entry(SVC_DN, &[("objectClass", &["applicationProcess"])]);
    dir.set_password(SVC_DN, SVC_SECRET);

    dir.add_entry(
        ALICE_DN,
        &[
            ("objectClass", &["inetOrgPerson"]),
            ("uid", &["alice"]),
            ("cn", &["Alice Price"]),
            ("mail", &["alice@example.com", "a.price@example.com"]),
        ],
    );
    dir.set_password(ALICE_DN, ALICE_SECRET);

    dir.add_entry(
        ENG_DN,
        &[("objectClass", &["groupOfNames"]), ("member", &[ALICE_DN])],
    );
    dir.add_entry(
        STAFF_DN,
        &[("objectClass", &["groupOfNames"]), ("member", &[ENG_DN])],
    );
    dir
}

/// Options matching [`nested_directory`]; search-then-bind by default.
pub fn nested_opts() -> DirectoryOpts {
    DirectoryOpts::new(DirectoryEndpoint::new("directory.example.com", 389))
        .with_service_account(SVC_DN, SVC_SECRET)
        .with_base_dns("ou=people,dc=example,dc=com", "ou=groups,dc=example,dc=com")
        .with_field_mappings(vec![
            FieldMapping::single("cn", "full_name"),
            FieldMapping::single("mail", "email"),
            FieldMapping::multi("mail", "emails"),
        ])
        .with_cache_ttl(Duration::from_secs(60))
}

/// The DNs of a resolved group set, sorted for assertions.
pub fn group_dns(groups: &HashSet<GroupEntry>) -> Vec<String> {
    let mut dns: Vec<String> = groups.iter().map(|g| g.dn.clone()).collect();
    dns.sort();
    dns
}
