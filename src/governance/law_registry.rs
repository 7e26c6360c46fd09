//! Law Registry Projection
//!
//! Indexes laws by status and next checkpoint deadline; feeds the tick's
//! checkpoint-overrun rule via `list_overdue`.

use crate::governance::events::{Event, EventKind, LawId, LawStatus, Reversibility, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Materialized law aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LawState {
    pub law_id: LawId,
    pub workspace_id: WorkspaceId,
    pub title: String,
    pub scope: String,
    pub reversibility: Reversibility,
    /// Review schedule in days after (re)activation, strictly increasing.
    pub checkpoints: Vec<u32>,
    pub params: BTreeMap<String, String>,
    pub status: LawStatus,
    pub checkpoint_index: u32,
    pub next_checkpoint_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Fold of law events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LawRegistry {
    laws: HashMap<LawId, LawState>,
}

impl LawRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &Event) {
        match &event.kind {
            EventKind::LawCreated {
                law_id,
                workspace_id,
                title,
                scope,
                reversibility,
                checkpoints,
                params,
            } => {
                self.laws.insert(
                    law_id.clone(),
                    LawState {
                        law_id: law_id.clone(),
                        workspace_id: workspace_id.clone(),
                        title: title.clone(),
                        scope: scope.clone(),
                        reversibility: *reversibility,
                        checkpoints: checkpoints.clone(),
                        params: params.clone(),
                        status: LawStatus::Draft,
                        checkpoint_index: 0,
                        next_checkpoint_at: None,
                        activated_at: None,
                        version: event.version,
                    },
                );
            }
            EventKind::LawActivated {
                law_id,
                activated_at,
                next_checkpoint_at,
            } => {
                if let Some(law) = self.laws.get_mut(law_id) {
                    law.status = LawStatus::Active;
                    law.activated_at = Some(*activated_at);
                    law.next_checkpoint_at = Some(*next_checkpoint_at);
                    law.checkpoint_index = 0;
                    law.version = event.version;
                }
            }
            EventKind::LawReviewTriggered { law_id, .. } => {
                if let Some(law) = self.laws.get_mut(law_id) {
                    law.status = LawStatus::Review;
                    law.version = event.version;
                }
            }
            EventKind::LawReviewCompleted {
                law_id,
                new_status,
                checkpoint_index,
                next_checkpoint_at,
                ..
            } => {
                if let Some(law) = self.laws.get_mut(law_id) {
                    law.status = *new_status;
                    law.checkpoint_index = *checkpoint_index;
                    law.next_checkpoint_at = *next_checkpoint_at;
                    law.version = event.version;
                }
            }
            EventKind::LawArchived { law_id } => {
                if let Some(law) = self.laws.get_mut(law_id) {
                    law.status = LawStatus::Archived;
                    law.next_checkpoint_at = None;
                    law.version = event.version;
                }
            }
            _ => {}
        }
    }

    pub fn law(&self, id: &str) -> Option<&LawState> {
        self.laws.get(id)
    }

    pub fn list_by_status(&self, status: LawStatus) -> Vec<&LawState> {
        let mut laws: Vec<&LawState> =
            self.laws.values().filter(|l| l.status == status).collect();
        laws.sort_by(|a, b| a.law_id.cmp(&b.law_id));
        laws
    }

    /// Active laws whose checkpoint deadline has passed, in id order.
    pub fn list_overdue(&self, now: DateTime<Utc>) -> Vec<&LawState> {
        let mut overdue: Vec<&LawState> = self
            .laws
            .values()
            .filter(|l| {
                l.status == LawStatus::Active
                    && l.next_checkpoint_at.map(|at| at < now).unwrap_or(false)
            })
            .collect();
        overdue.sort_by(|a, b| a.law_id.cmp(&b.law_id));
        overdue
    }

    pub fn len(&self) -> usize {
        self.laws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laws.is_empty()
    }
}
