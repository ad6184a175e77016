//! Transitive group membership resolution.
//!
//! The membership graph is a general directed graph: nested groups can form
//! cycles, and one group can be reachable over several paths. Resolution is
//! a breadth-first traversal with a visited set recorded before parents are
//! enqueued, so every group is fetched and processed at most once and the
//! traversal terminates on any input.

use crate::backend::{SearchScope, escape_filter_value};
use crate::connection::Connection;
use crate::entry::{GroupEntry, UserEntry, normalize_dn};
use crate::error::DirectoryError;
use crate::options::{DirectoryOpts, MembershipSchema};
use crate::report::ErrorReporter;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// Computes the transitive closure of a user's group memberships.
#[derive(Debug)]
pub struct GroupResolver {
    schema: MembershipSchema,
    group_base_dn: String,
    group_filter: String,
    membership_attribute: String,
    member_of_attribute: String,
    reporter: Arc<ErrorReporter>,
}

/// A visited group waiting for its parents to be expanded. `parent_dns` is
/// only populated under the memberOf convention, where the group entry
/// itself names its parents.
struct QueuedGroup {
    entry: GroupEntry,
    parent_dns: Vec<String>,
    depth: u32,
}

impl GroupResolver {
    /// Creates a resolver from the resolved configuration, reporting
    /// dropped branches through the given reporter.
    pub fn new(opts: &DirectoryOpts, reporter: Arc<ErrorReporter>) -> Self {
        GroupResolver {
            schema: opts.membership_schema,
            group_base_dn: opts.group_base_dn.clone(),
            group_filter: opts.group_filter.clone(),
            membership_attribute: opts.membership_attribute.clone(),
            member_of_attribute: opts.member_of_attribute.clone(),
            reporter,
        }
    }

    /// Resolves the set of groups the user belongs to, directly or through
    /// nesting, up to `max_depth` hops. Groups deeper than the bound are
    /// treated as not-a-member. A search failure on one group node drops
    /// that branch and is recorded through the reporter; traversal
    /// continues for the remaining nodes.
    #[tracing_attributes::instrument(skip(self, conn, user), fields(user_dn = %user.dn, max_depth))]
    pub async fn resolve(
        &self,
        conn: &mut Connection,
        user: &UserEntry,
        max_depth: u32,
    ) -> Result<HashSet<GroupEntry>, DirectoryError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut resolved: HashSet<GroupEntry> = HashSet::new();
        let mut queue: VecDeque<QueuedGroup> = VecDeque::new();

        if max_depth == 0 {
            return Ok(resolved);
        }

        // Seed with the user's direct memberships (one hop).
        for queued in self.direct_memberships(conn, user).await? {
            if visited.insert(normalize_dn(&queued.entry.dn)) {
                queue.push_back(queued);
            }
        }

        while let Some(group) = queue.pop_front() {
            if group.depth < max_depth {
                match self.parents_of(conn, &group).await {
                    Ok(parents) => {
                        for parent in parents {
                            if visited.insert(normalize_dn(&parent.entry.dn)) {
                                queue.push_back(parent);
                            }
                        }
                    }
                    Err(e) => {
                        // Tolerated: drop this branch, keep the siblings.
                        warn!(group_dn = %group.entry.dn, error = %e, "dropping unreachable group branch");
                        self.reporter.record(&DirectoryError::PartialResolution {
                            group_dn: group.entry.dn.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            resolved.insert(group.entry);
        }

        debug!(groups = resolved.len(), "group resolution complete");
        Ok(resolved)
    }

    /// The user's direct group memberships, at traversal depth 1.
    ///
    /// A failure here is fatal for the whole resolution: with no seed there
    /// is nothing to best-effort about. Under the memberOf convention the
    /// individual group fetches are still tolerated per node.
    async fn direct_memberships(
        &self,
        conn: &mut Connection,
        user: &UserEntry,
    ) -> Result<Vec<QueuedGroup>, DirectoryError> {
        match self.schema {
            MembershipSchema::MemberOnGroup => self.groups_containing(conn, &user.dn, 1).await,
            MembershipSchema::MemberOfOnUser => {
                let parent_dns: Vec<String> =
                    user.all(&self.member_of_attribute).to_vec();
                Ok(self.fetch_groups(conn, &parent_dns, 1, &user.dn).await)
            }
        }
    }

    /// The parents of one already-visited group.
    async fn parents_of(
        &self,
        conn: &mut Connection,
        group: &QueuedGroup,
    ) -> Result<Vec<QueuedGroup>, DirectoryError> {
        match self.schema {
            MembershipSchema::MemberOnGroup => {
                self.groups_containing(conn, &group.entry.dn, group.depth + 1)
                    .await
            }
            MembershipSchema::MemberOfOnUser => Ok(self
                .fetch_groups(conn, &group.parent_dns, group.depth + 1, &group.entry.dn)
                .await),
        }
    }

    /// Member-list convention: one search for all groups whose member
    /// attribute carries `member_dn`.
    async fn groups_containing(
        &self,
        conn: &mut Connection,
        member_dn: &str,
        depth: u32,
    ) -> Result<Vec<QueuedGroup>, DirectoryError> {
        let filter = format!(
            "(&{}({}={}))",
            self.group_filter,
            self.membership_attribute,
            escape_filter_value(member_dn)
        );
        let attrs = [self.membership_attribute.as_str()];
        let entries = conn
            .search(&self.group_base_dn, SearchScope::Subtree, &filter, &attrs)
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let members = attr_values(&entry.attrs, &self.membership_attribute);
                QueuedGroup {
                    entry: GroupEntry::new(entry.dn, members),
                    parent_dns: Vec::new(),
                    depth,
                }
            })
            .collect())
    }

    /// memberOf convention: fetch each named group entry to learn its own
    /// parents. A fetch failure drops that single node (recorded), not the
    /// whole batch.
    async fn fetch_groups(
        &self,
        conn: &mut Connection,
        group_dns: &[String],
        depth: u32,
        child_dn: &str,
    ) -> Vec<QueuedGroup> {
        let attrs = [
            self.membership_attribute.as_str(),
            self.member_of_attribute.as_str(),
        ];
        let mut out = Vec::new();
        for dn in group_dns {
            match conn
                .search(dn, SearchScope::Base, "(objectClass=*)", &attrs)
                .await
            {
                Ok(entries) => {
                    if let Some(entry) = entries.into_iter().next() {
                        let members = attr_values(&entry.attrs, &self.membership_attribute);
                        let parent_dns = attr_values(&entry.attrs, &self.member_of_attribute);
                        out.push(QueuedGroup {
                            entry: GroupEntry::new(entry.dn, members),
                            parent_dns,
                            depth,
                        });
                    }
                }
                Err(e) => {
                    warn!(group_dn = %dn, child_dn = %child_dn, error = %e, "dropping unreachable group node");
                    self.reporter.record(&DirectoryError::PartialResolution {
                        group_dn: dn.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        out
    }
}

/// Case-insensitive attribute lookup on a raw entry.
fn attr_values(
    attrs: &std::collections::HashMap<String, Vec<String>>,
    name: &str,
) -> Vec<String> {
    attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}
