//! Governance Kernel Façade
//!
//! Serializes every write path: load the stream head, run the handler
//! against a consistent projection snapshot, append under the expected
//! version, fold the new events back into the projections, return the
//! updated aggregate view. The tick goes through the same append path.
//!
//! # Concurrency Model
//!
//! Single writer per process. Handlers, invariants, and projection
//! application are synchronous; the only suspension point is inside the
//! log append. `VersionConflict` is retried once with a fresh snapshot;
//! an already-applied `command_id` is coerced to success.

use crate::governance::budget_registry::BudgetState;
use crate::governance::clock::Clock;
use crate::governance::commands::{Command, CommandEnvelope};
use crate::governance::delegation_graph::DelegationState;
use crate::governance::error::{KernelError, KernelResult};
use crate::governance::events::{Event, StreamType};
use crate::governance::freedom_health::{self, FreedomHealth};
use crate::governance::handlers::{handle, HandlerContext, HandlerOutput};
use crate::governance::ids::IdSource;
use crate::governance::law_registry::LawState;
use crate::governance::policy::SafetyPolicy;
use crate::governance::procurement::{SupplierState, TenderState};
use crate::governance::projections::ProjectionSet;
use crate::governance::store::{AppendOutcome, EventLog, MemoryEventLog};
use crate::governance::tick::plan_tick;
use crate::governance::workspace_registry::WorkspaceState;
use crate::telemetry::redact;
use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Export the health snapshot to the metrics sink.
fn record_health_gauges(health: &FreedomHealth) {
    gauge!("polity_delegation_gini", health.delegation_gini);
    gauge!("polity_supplier_gini", health.supplier_gini);
    gauge!("polity_max_in_degree", health.max_in_degree as f64);
    gauge!("polity_overdue_reviews", health.overdue_reviews as f64);
    gauge!("polity_risk_level", health.risk.as_code() as f64);
}

/// Updated aggregate state returned after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateView {
    Workspace(WorkspaceState),
    Delegation(DelegationState),
    Law(LawState),
    Budget(BudgetState),
    Tender(TenderState),
    Supplier(SupplierState),
}

/// What a command did.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Events appended by this call (empty on dedup or no-op).
    pub events: Vec<Event>,
    /// True when the command id had already been applied.
    pub deduplicated: bool,
    /// Current state of the touched aggregate.
    pub view: Option<AggregateView>,
}

/// The application service. Owns the log handle, the projections, and
/// the injected clock/id/policy values.
pub struct GovernanceKernel {
    log: Box<dyn EventLog>,
    projections: ProjectionSet,
    policy: SafetyPolicy,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdSource>,
    newest_occurred_at: Option<DateTime<Utc>>,
}

impl GovernanceKernel {
    /// Build a kernel over an existing log, rebuilding all projections
    /// by full replay.
    pub fn new(
        log: Box<dyn EventLog>,
        policy: SafetyPolicy,
        clock: Box<dyn Clock>,
        ids: Box<dyn IdSource>,
    ) -> KernelResult<Self> {
        let mut kernel = Self {
            log,
            projections: ProjectionSet::new(),
            policy,
            clock,
            ids,
            newest_occurred_at: None,
        };
        kernel.rebuild()?;
        Ok(kernel)
    }

    /// Ephemeral kernel over an in-memory log; tests and tooling.
    pub fn in_memory(
        policy: SafetyPolicy,
        clock: Box<dyn Clock>,
        ids: Box<dyn IdSource>,
    ) -> KernelResult<Self> {
        Self::new(Box::new(MemoryEventLog::new()), policy, clock, ids)
    }

    /// Drop and refold every projection from the full log. Deterministic:
    /// produces the same state as incremental application.
    pub fn rebuild(&mut self) -> KernelResult<()> {
        let events = self.log.load_all()?;
        let mut projections = ProjectionSet::new();
        projections.apply_all(events.iter());
        self.newest_occurred_at = events.last().map(|e| e.occurred_at);
        self.projections = projections;
        debug!(events = events.len(), "projections rebuilt from log");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Execute one command end to end.
    pub fn execute(&mut self, envelope: CommandEnvelope) -> KernelResult<CommandOutcome> {
        let started = std::time::Instant::now();
        let correlation_id = self.ids.correlation_id();
        let now = self.clock.now();
        self.check_clock(now)?;

        counter!("polity_commands_total", 1);
        let result = self.execute_inner(&envelope, now);
        histogram!("polity_command_seconds", started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => {
                counter!("polity_events_appended_total", outcome.events.len() as u64);
                info!(
                    command = envelope.command.name(),
                    correlation_id = %correlation_id,
                    actor_id = %redact("actor_id", &envelope.actor_id),
                    events = outcome.events.len(),
                    deduplicated = outcome.deduplicated,
                    "command applied"
                );
            }
            Err(err) => {
                counter!("polity_commands_rejected_total", 1);
                warn!(
                    command = envelope.command.name(),
                    correlation_id = %correlation_id,
                    actor_id = %redact("actor_id", &envelope.actor_id),
                    error = %err,
                    "command rejected"
                );
            }
        }
        result
    }

    fn execute_inner(
        &mut self,
        envelope: &CommandEnvelope,
        now: DateTime<Utc>,
    ) -> KernelResult<CommandOutcome> {
        for attempt in 0..2 {
            let ctx = HandlerContext {
                now,
                policy: &self.policy,
                projections: &self.projections,
            };
            let output = handle(envelope, &ctx)?;
            if output.kinds.is_empty() {
                return Ok(CommandOutcome {
                    events: Vec::new(),
                    deduplicated: false,
                    view: self.view_for(&envelope.command),
                });
            }

            let expected = self.log.stream_version(&output.stream_id)?;
            let events = self.build_events(&output, envelope, now, expected);
            match self.log.append(&output.stream_id, expected, events.clone()) {
                Ok(AppendOutcome::Appended { .. }) => {
                    for event in &events {
                        self.projections.apply(event);
                    }
                    self.newest_occurred_at = Some(now);
                    return Ok(CommandOutcome {
                        events,
                        deduplicated: false,
                        view: self.view_for(&envelope.command),
                    });
                }
                Ok(AppendOutcome::AlreadyApplied { command_id }) => {
                    debug!(command_id = %command_id, "idempotent replay, returning current view");
                    return Ok(CommandOutcome {
                        events: Vec::new(),
                        deduplicated: true,
                        view: self.view_for(&envelope.command),
                    });
                }
                Err(err @ crate::governance::store::StoreError::VersionConflict { .. })
                    if attempt == 0 =>
                {
                    debug!(error = %err, "version conflict, retrying once with fresh snapshot");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(KernelError::LogUnavailable(
            "append retry exhausted".to_string(),
        ))
    }

    /// Materialize envelope events: versions relative to the stream head,
    /// ids from the injected source, follower command ids derived from
    /// the caller's key so the batch satisfies global uniqueness.
    fn build_events(
        &self,
        output: &HandlerOutput,
        envelope: &CommandEnvelope,
        now: DateTime<Utc>,
        expected: u64,
    ) -> Vec<Event> {
        output
            .kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| Event {
                event_id: self.ids.next_event_id(now),
                stream_id: output.stream_id.clone(),
                stream_type: output.stream_type,
                version: expected + 1 + i as u64,
                command_id: if i == 0 {
                    envelope.command_id
                } else {
                    Uuid::new_v5(&envelope.command_id, &[i as u8])
                },
                occurred_at: now,
                actor_id: envelope.actor_id.clone(),
                kind: kind.clone(),
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Run the reflex scan at the current clock instant, appending any
    /// emitted events through the normal path.
    pub fn tick(&mut self) -> KernelResult<Vec<Event>> {
        let now = self.clock.now();
        self.check_clock(now)?;

        let plan = plan_tick(now, &self.policy, &self.projections);
        let mut appended: Vec<Event> = Vec::new();
        for (stream_id, kinds) in plan.batches {
            if kinds.is_empty() {
                continue;
            }
            let expected = self.log.stream_version(&stream_id)?;
            let events: Vec<Event> = kinds
                .into_iter()
                .enumerate()
                .map(|(i, kind)| Event {
                    event_id: self.ids.next_event_id(now),
                    stream_id: stream_id.clone(),
                    stream_type: StreamType::System,
                    version: expected + 1 + i as u64,
                    command_id: self.ids.new_command_id(),
                    occurred_at: now,
                    actor_id: String::new(),
                    kind,
                })
                .collect();
            match self.log.append(&stream_id, expected, events.clone())? {
                AppendOutcome::Appended { .. } => {
                    for event in &events {
                        self.projections.apply(event);
                    }
                    appended.extend(events);
                }
                AppendOutcome::AlreadyApplied { .. } => {}
            }
        }
        if !appended.is_empty() {
            self.newest_occurred_at = Some(now);
        }

        let health = freedom_health::compute(now, &self.policy, &self.projections);
        record_health_gauges(&health);
        info!(reflex_events = appended.len(), risk = health.risk.as_str(), "tick complete");
        Ok(appended)
    }

    fn check_clock(&self, now: DateTime<Utc>) -> KernelResult<()> {
        if let Some(newest) = self.newest_occurred_at {
            if now < newest {
                return Err(KernelError::ClockRegression {
                    now: now.to_rfc3339(),
                    newest: newest.to_rfc3339(),
                });
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn projections(&self) -> &ProjectionSet {
        &self.projections
    }

    /// Full event sequence in replay order.
    pub fn load_all_events(&self) -> KernelResult<Vec<Event>> {
        Ok(self.log.load_all()?)
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    pub fn workspace(&self, id: &str) -> Option<&WorkspaceState> {
        self.projections.workspaces.workspace(id)
    }

    pub fn delegation(&self, id: &str) -> Option<&DelegationState> {
        self.projections.delegations.delegation(id)
    }

    pub fn law(&self, id: &str) -> Option<&LawState> {
        self.projections.laws.law(id)
    }

    pub fn budget(&self, id: &str) -> Option<&BudgetState> {
        self.projections.budgets.budget(id)
    }

    pub fn tender(&self, id: &str) -> Option<&TenderState> {
        self.projections.tenders.tender(id)
    }

    pub fn supplier(&self, id: &str) -> Option<&SupplierState> {
        self.projections.suppliers.supplier(id)
    }

    /// Current systemic risk, computed on demand.
    pub fn freedom_health(&self) -> FreedomHealth {
        freedom_health::compute(self.clock.now(), &self.policy, &self.projections)
    }

    fn view_for(&self, command: &Command) -> Option<AggregateView> {
        match command {
            Command::CreateWorkspace { workspace_id, .. }
            | Command::ArchiveWorkspace { workspace_id } => self
                .workspace(workspace_id)
                .cloned()
                .map(AggregateView::Workspace),
            Command::DelegateDecisionRight { delegation_id, .. }
            | Command::RevokeDelegation { delegation_id } => self
                .delegation(delegation_id)
                .cloned()
                .map(AggregateView::Delegation),
            Command::CreateLaw { law_id, .. }
            | Command::ActivateLaw { law_id }
            | Command::CompleteReview { law_id, .. }
            | Command::ArchiveLaw { law_id } => self.law(law_id).cloned().map(AggregateView::Law),
            Command::CreateBudget { budget_id, .. }
            | Command::ActivateBudget { budget_id }
            | Command::AdjustAllocation { budget_id, .. }
            | Command::ApproveExpenditure { budget_id, .. }
            | Command::CloseBudget { budget_id } => {
                self.budget(budget_id).cloned().map(AggregateView::Budget)
            }
            Command::RegisterSupplier { supplier_id, .. } => self
                .supplier(supplier_id)
                .cloned()
                .map(AggregateView::Supplier),
            Command::CreateTender { tender_id, .. }
            | Command::OpenTender { tender_id }
            | Command::AwardTender { tender_id, .. }
            | Command::CloseTender { tender_id } => {
                self.tender(tender_id).cloned().map(AggregateView::Tender)
            }
        }
    }
}
