//! Workspace Registry Projection

use crate::governance::events::{Event, EventKind, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Materialized workspace aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub parent_workspace_id: Option<WorkspaceId>,
    pub scope: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    /// Archival is terminal.
    pub archived_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl WorkspaceState {
    pub fn is_active(&self) -> bool {
        self.archived_at.is_none()
    }
}

/// Fold of workspace events into a registry keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRegistry {
    workspaces: HashMap<WorkspaceId, WorkspaceState>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::WorkspaceCreated {
                workspace_id,
                name,
                parent_workspace_id,
                scope,
            } => {
                self.workspaces.insert(
                    workspace_id.clone(),
                    WorkspaceState {
                        workspace_id: workspace_id.clone(),
                        name: name.clone(),
                        parent_workspace_id: parent_workspace_id.clone(),
                        scope: scope.clone(),
                        created_at: event.occurred_at,
                        archived_at: None,
                        version: event.version,
                    },
                );
            }
            EventKind::WorkspaceArchived { workspace_id } => {
                if let Some(ws) = self.workspaces.get_mut(workspace_id) {
                    ws.archived_at = Some(event.occurred_at);
                    ws.version = event.version;
                }
            }
            _ => {}
        }
    }

    pub fn workspace(&self, id: &str) -> Option<&WorkspaceState> {
        self.workspaces.get(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.workspaces.get(id).map(|w| w.is_active()).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }
}
