//! Delegation Graph Projection
//!
//! Maintains the set of active delegation edges, per-actor in-degrees,
//! and a per-workspace index. The cycle query reflects every event
//! applied so far; because writes serialize through the façade, checking
//! against this projection is sufficient to keep the graph acyclic.

use crate::governance::events::{
    ActorId, DelegationId, Event, EventKind, Visibility, WorkspaceId,
};
use crate::governance::invariants::would_create_cycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Materialized delegation aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationState {
    pub delegation_id: DelegationId,
    pub workspace_id: WorkspaceId,
    pub from_actor: ActorId,
    pub to_actor: ActorId,
    pub ttl_days: u32,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl DelegationState {
    /// Active: neither revoked nor expired. Wall-clock expiry is applied
    /// by the tick; until then the edge stays in the active set.
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none() && self.expired_at.is_none()
    }
}

/// Fold of delegation events into the active-edge graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelegationGraph {
    delegations: HashMap<DelegationId, DelegationState>,
    /// Parallel-edge counts per (from, to) pair.
    edge_counts: HashMap<ActorId, BTreeMap<ActorId, u32>>,
    /// Active adjacency (edge present iff count > 0); feeds the DFS.
    adjacency: HashMap<ActorId, BTreeSet<ActorId>>,
    in_degree: HashMap<ActorId, u64>,
    /// Actors appearing in any active edge (sources count with degree 0).
    active_actors: BTreeSet<ActorId>,
    by_workspace: HashMap<WorkspaceId, BTreeSet<DelegationId>>,
}

impl DelegationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::DecisionRightDelegated {
                delegation_id,
                workspace_id,
                from_actor,
                to_actor,
                ttl_days,
                visibility,
                expires_at,
            } => {
                self.delegations.insert(
                    delegation_id.clone(),
                    DelegationState {
                        delegation_id: delegation_id.clone(),
                        workspace_id: workspace_id.clone(),
                        from_actor: from_actor.clone(),
                        to_actor: to_actor.clone(),
                        ttl_days: *ttl_days,
                        visibility: *visibility,
                        created_at: event.occurred_at,
                        expires_at: *expires_at,
                        revoked_at: None,
                        expired_at: None,
                        version: event.version,
                    },
                );
                self.add_edge(from_actor, to_actor);
                self.by_workspace
                    .entry(workspace_id.clone())
                    .or_default()
                    .insert(delegation_id.clone());
            }
            EventKind::DelegationRevoked { delegation_id } => {
                self.deactivate(delegation_id, |state, at| state.revoked_at = Some(at), event.occurred_at);
            }
            EventKind::DelegationExpired {
                delegation_id,
                expired_at,
                ..
            } => {
                self.deactivate(delegation_id, |state, at| state.expired_at = Some(at), *expired_at);
            }
            _ => {}
        }
    }

    fn deactivate<F>(&mut self, delegation_id: &str, mark: F, at: DateTime<Utc>)
    where
        F: FnOnce(&mut DelegationState, DateTime<Utc>),
    {
        let Some(state) = self.delegations.get_mut(delegation_id) else {
            return;
        };
        if !state.is_active() {
            return;
        }
        mark(state, at);
        let (from, to) = (state.from_actor.clone(), state.to_actor.clone());
        self.remove_edge(&from, &to);
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        let count = self
            .edge_counts
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0);
        *count += 1;
        if *count == 1 {
            self.adjacency
                .entry(from.to_string())
                .or_default()
                .insert(to.to_string());
        }
        *self.in_degree.entry(to.to_string()).or_insert(0) += 1;
        self.active_actors.insert(from.to_string());
        self.active_actors.insert(to.to_string());
    }

    fn remove_edge(&mut self, from: &str, to: &str) {
        let mut gone = false;
        if let Some(targets) = self.edge_counts.get_mut(from) {
            if let Some(count) = targets.get_mut(to) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    targets.remove(to);
                    gone = true;
                }
            }
            if targets.is_empty() {
                self.edge_counts.remove(from);
            }
        }
        if gone {
            if let Some(set) = self.adjacency.get_mut(from) {
                set.remove(to);
                if set.is_empty() {
                    self.adjacency.remove(from);
                }
            }
        }
        if let Some(degree) = self.in_degree.get_mut(to) {
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                self.in_degree.remove(to);
            }
        }
        self.rebuild_active_actor(from);
        self.rebuild_active_actor(to);
    }

    fn rebuild_active_actor(&mut self, actor: &str) {
        let still_source = self.edge_counts.contains_key(actor);
        let still_target = self.in_degree.contains_key(actor);
        if !still_source && !still_target {
            self.active_actors.remove(actor);
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn delegation(&self, id: &str) -> Option<&DelegationState> {
        self.delegations.get(id)
    }

    /// Active-edge adjacency, for the cycle invariant.
    pub fn adjacency(&self) -> &HashMap<ActorId, BTreeSet<ActorId>> {
        &self.adjacency
    }

    /// Would `from -> to` close a cycle in the active graph?
    pub fn would_create_cycle(&self, from: &str, to: &str) -> bool {
        would_create_cycle(&self.adjacency, from, to)
    }

    pub fn in_degree(&self, actor: &str) -> u64 {
        self.in_degree.get(actor).copied().unwrap_or(0)
    }

    pub fn max_in_degree(&self) -> u64 {
        self.in_degree.values().copied().max().unwrap_or(0)
    }

    /// Number of actors participating in any active edge.
    pub fn actor_count(&self) -> u64 {
        self.active_actors.len() as u64
    }

    /// In-degree per participating actor (sources contribute zeros), in
    /// stable actor order.
    pub fn in_degree_distribution(&self) -> Vec<u128> {
        self.active_actors
            .iter()
            .map(|actor| self.in_degree(actor) as u128)
            .collect()
    }

    /// Distribution as it would look with one more edge into `to`.
    pub fn in_degree_distribution_with_edge(&self, to: &str) -> Vec<u128> {
        let mut found = false;
        let mut dist: Vec<u128> = self
            .active_actors
            .iter()
            .map(|actor| {
                let mut degree = self.in_degree(actor) as u128;
                if actor == to {
                    degree += 1;
                    found = true;
                }
                degree
            })
            .collect();
        if !found {
            dist.push(1);
        }
        dist
    }

    pub fn active_edge_count(&self) -> u64 {
        self.in_degree.values().sum()
    }

    /// Active delegations whose deadline has passed, in id order so the
    /// tick emits deterministically.
    pub fn expiring_before(&self, now: DateTime<Utc>) -> Vec<&DelegationState> {
        let mut due: Vec<&DelegationState> = self
            .delegations
            .values()
            .filter(|d| d.is_active() && d.expires_at < now)
            .collect();
        due.sort_by(|a, b| a.delegation_id.cmp(&b.delegation_id));
        due
    }

    /// All active delegations in id order.
    pub fn active_delegations(&self) -> Vec<&DelegationState> {
        let mut active: Vec<&DelegationState> = self
            .delegations
            .values()
            .filter(|d| d.is_active())
            .collect();
        active.sort_by(|a, b| a.delegation_id.cmp(&b.delegation_id));
        active
    }

    pub fn workspace_delegations(&self, workspace_id: &str) -> Vec<&DelegationState> {
        self.by_workspace
            .get(workspace_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.delegations.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn active_count(&self) -> usize {
        self.delegations.values().filter(|d| d.is_active()).count()
    }
}
