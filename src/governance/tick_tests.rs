//! Tick Engine Tests
//!
//! Expiry and checkpoint rules under the virtual clock, concentration
//! latching, audit-rule signatures, and same-instant idempotency.

use crate::governance::amount::to_amount;
use crate::governance::clock::{Clock, VirtualClock};
use crate::governance::commands::{Command, CommandEnvelope};
use crate::governance::error::KernelError;
use crate::governance::events::{
    BudgetItemInit, EventKind, FlexClass, LawStatus, Reversibility, ReviewOutcome,
    SelectionMechanism, Visibility,
};
use crate::governance::facade::{CommandOutcome, GovernanceKernel};
use crate::governance::ids::SequentialIdSource;
use crate::governance::invariants::ValidationError;
use crate::governance::policy::SafetyPolicy;
use crate::governance::projections::ProjectionSet;
use crate::governance::tick::plan_tick;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn cid(n: u128) -> Uuid {
    Uuid::from_u128((0x71C4_u128 << 96) | n)
}

fn kernel_with(clock: &VirtualClock, policy: SafetyPolicy) -> GovernanceKernel {
    GovernanceKernel::in_memory(
        policy,
        Box::new(clock.clone()),
        Box::new(SequentialIdSource::new()),
    )
    .expect("kernel construction")
}

fn run(
    kernel: &mut GovernanceKernel,
    n: u128,
    command: Command,
) -> Result<CommandOutcome, KernelError> {
    kernel.execute(CommandEnvelope::new(cid(n), "operator", command))
}

fn workspace(kernel: &mut GovernanceKernel, n: u128) {
    run(
        kernel,
        n,
        Command::CreateWorkspace {
            workspace_id: "w1".to_string(),
            name: "grid".to_string(),
            parent_workspace_id: None,
            scope: BTreeMap::new(),
        },
    )
    .expect("workspace");
}

fn delegate(kernel: &mut GovernanceKernel, n: u128, id: &str, from: &str, to: &str, ttl: u32) {
    run(
        kernel,
        n,
        Command::DelegateDecisionRight {
            delegation_id: id.to_string(),
            workspace_id: "w1".to_string(),
            from_actor: from.to_string(),
            to_actor: to.to_string(),
            ttl_days: ttl,
            visibility: Visibility::Private,
        },
    )
    .expect("delegate");
}

#[test]
fn test_delegation_expiry_under_virtual_clock() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_with(&clock, SafetyPolicy::default());
    workspace(&mut kernel, 1);
    delegate(&mut kernel, 2, "d1", "A", "B", 30);

    // Not due yet.
    clock.advance_days(29);
    assert!(kernel.tick().expect("tick").is_empty());

    clock.advance_days(2);
    let events = kernel.tick().expect("tick");
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0].kind,
        EventKind::DelegationExpired { delegation_id, .. } if delegation_id == "d1"
    ));

    let graph = &kernel.projections().delegations;
    assert_eq!(graph.in_degree("B"), 0, "edge must leave the active graph");
    assert_eq!(graph.active_count(), 0);
    assert!(kernel.delegation("d1").unwrap().expired_at.is_some());

    // Idempotent at the same instant.
    assert!(kernel.tick().expect("second tick").is_empty());
}

#[test]
fn test_law_checkpoint_flow() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_with(&clock, SafetyPolicy::default());
    workspace(&mut kernel, 1);
    run(
        &mut kernel,
        2,
        Command::CreateLaw {
            law_id: "l1".to_string(),
            workspace_id: "w1".to_string(),
            title: "energy act".to_string(),
            scope: "energy".to_string(),
            reversibility: Reversibility::Reversible,
            checkpoints: Some(vec![30, 90, 180, 365]),
            params: BTreeMap::new(),
        },
    )
    .expect("law");
    run(
        &mut kernel,
        3,
        Command::ActivateLaw {
            law_id: "l1".to_string(),
        },
    )
    .expect("activate");
    assert_eq!(
        kernel.law("l1").unwrap().next_checkpoint_at,
        Some(start() + chrono::Duration::days(30))
    );

    clock.advance_days(31);
    let events = kernel.tick().expect("tick");
    assert!(events
        .iter()
        .any(|e| matches!(&e.kind, EventKind::LawReviewTriggered { law_id, .. } if law_id == "l1")));
    assert_eq!(kernel.law("l1").unwrap().status, LawStatus::Review);
    assert_eq!(
        kernel.projections().laws.list_by_status(LawStatus::Review).len(),
        1
    );

    // Overdue law no longer counts as ACTIVE; a second tick is silent.
    assert!(kernel.tick().expect("second tick").is_empty());

    let review_now = clock.now();
    run(
        &mut kernel,
        4,
        Command::CompleteReview {
            law_id: "l1".to_string(),
            outcome: ReviewOutcome::Continue,
        },
    )
    .expect("continue");
    let law = kernel.law("l1").unwrap();
    assert_eq!(law.status, LawStatus::Active);
    assert_eq!(law.checkpoint_index, 1);
    assert_eq!(
        law.next_checkpoint_at,
        Some(review_now + chrono::Duration::days(90))
    );
}

#[test]
fn test_review_adjust_restarts_schedule() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_with(&clock, SafetyPolicy::default());
    workspace(&mut kernel, 1);
    run(
        &mut kernel,
        2,
        Command::CreateLaw {
            law_id: "l1".to_string(),
            workspace_id: "w1".to_string(),
            title: "energy act".to_string(),
            scope: "energy".to_string(),
            reversibility: Reversibility::Reversible,
            checkpoints: Some(vec![30, 90]),
            params: BTreeMap::new(),
        },
    )
    .expect("law");
    run(&mut kernel, 3, Command::ActivateLaw { law_id: "l1".to_string() }).expect("activate");

    clock.advance_days(31);
    kernel.tick().expect("tick");
    let review_now = clock.now();
    run(
        &mut kernel,
        4,
        Command::CompleteReview {
            law_id: "l1".to_string(),
            outcome: ReviewOutcome::Adjust,
        },
    )
    .expect("adjust");
    let law = kernel.law("l1").unwrap();
    assert_eq!(law.checkpoint_index, 0);
    assert_eq!(
        law.next_checkpoint_at,
        Some(review_now + chrono::Duration::days(30))
    );
}

#[test]
fn test_continue_past_final_checkpoint_sunsets() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_with(&clock, SafetyPolicy::default());
    workspace(&mut kernel, 1);
    run(
        &mut kernel,
        2,
        Command::CreateLaw {
            law_id: "l1".to_string(),
            workspace_id: "w1".to_string(),
            title: "pilot".to_string(),
            scope: "energy".to_string(),
            reversibility: Reversibility::Reversible,
            checkpoints: Some(vec![30]),
            params: BTreeMap::new(),
        },
    )
    .expect("law");
    run(&mut kernel, 3, Command::ActivateLaw { law_id: "l1".to_string() }).expect("activate");
    clock.advance_days(31);
    kernel.tick().expect("tick");
    run(
        &mut kernel,
        4,
        Command::CompleteReview {
            law_id: "l1".to_string(),
            outcome: ReviewOutcome::Continue,
        },
    )
    .expect("continue past the end");
    assert_eq!(kernel.law("l1").unwrap().status, LawStatus::Sunset);
    assert_eq!(kernel.law("l1").unwrap().next_checkpoint_at, None);

    run(&mut kernel, 5, Command::ArchiveLaw { law_id: "l1".to_string() }).expect("archive");
    assert_eq!(kernel.law("l1").unwrap().status, LawStatus::Archived);
}

#[test]
fn test_irreversible_law_requires_early_first_checkpoint() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_with(&clock, SafetyPolicy::default());
    workspace(&mut kernel, 1);
    let err = run(
        &mut kernel,
        2,
        Command::CreateLaw {
            law_id: "l1".to_string(),
            workspace_id: "w1".to_string(),
            title: "dam".to_string(),
            scope: "infrastructure".to_string(),
            reversibility: Reversibility::Irreversible,
            checkpoints: Some(vec![90, 180]),
            params: BTreeMap::new(),
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        KernelError::Validation(ValidationError::CheckpointScheduleInvalid { .. })
    ));

    // The policy default schedule for the class satisfies the bound.
    run(
        &mut kernel,
        3,
        Command::CreateLaw {
            law_id: "l2".to_string(),
            workspace_id: "w1".to_string(),
            title: "dam".to_string(),
            scope: "infrastructure".to_string(),
            reversibility: Reversibility::Irreversible,
            checkpoints: None,
            params: BTreeMap::new(),
        },
    )
    .expect("default schedule");
    assert_eq!(kernel.law("l2").unwrap().checkpoints[0], 30);
}

#[test]
fn test_concentration_warn_then_halt_then_enforcement() {
    let clock = VirtualClock::new(start());
    // Isolate the in-degree rule: park the Gini thresholds out of reach.
    let policy = SafetyPolicy {
        delegation_in_degree_warn: 2,
        delegation_in_degree_halt: 4,
        delegation_gini_warn: 0.99,
        delegation_gini_halt: 0.999,
        ..SafetyPolicy::default()
    };
    let mut kernel = kernel_with(&clock, policy);
    workspace(&mut kernel, 1);

    delegate(&mut kernel, 2, "d1", "a1", "hub", 90);
    delegate(&mut kernel, 3, "d2", "a2", "hub", 90);
    let events = kernel.tick().expect("tick at warn");
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].kind,
        EventKind::DelegationConcentrationWarning { max_in_degree: 2, .. }
    ));

    // Unchanged level: no re-emission.
    assert!(kernel.tick().expect("repeat tick").is_empty());

    delegate(&mut kernel, 4, "d3", "a3", "hub", 90);
    delegate(&mut kernel, 5, "d4", "a4", "hub", 90);
    let events = kernel.tick().expect("tick at halt");
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0].kind,
        EventKind::DelegationConcentrationHalt { max_in_degree: 4, .. }
    ));
    assert!(matches!(events[1].kind, EventKind::TransparencyEscalated { .. }));

    // Latched halt: a further concentrating edge is refused.
    let err = run(
        &mut kernel,
        6,
        Command::DelegateDecisionRight {
            delegation_id: "d5".to_string(),
            workspace_id: "w1".to_string(),
            from_actor: "a5".to_string(),
            to_actor: "hub".to_string(),
            ttl_days: 90,
            visibility: Visibility::Private,
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        KernelError::Validation(ValidationError::ConcentrationHaltActive { in_degree: 4, .. })
    ));

    // A non-concentrating edge elsewhere is still allowed.
    delegate(&mut kernel, 7, "d6", "a1", "a2", 90);
}

#[test]
fn test_halt_deescalates_to_warning() {
    let clock = VirtualClock::new(start());
    let policy = SafetyPolicy {
        delegation_in_degree_warn: 2,
        delegation_in_degree_halt: 3,
        delegation_gini_warn: 0.99,
        delegation_gini_halt: 0.999,
        ..SafetyPolicy::default()
    };
    let mut kernel = kernel_with(&clock, policy);
    workspace(&mut kernel, 1);
    delegate(&mut kernel, 2, "d1", "a1", "hub", 90);
    delegate(&mut kernel, 3, "d2", "a2", "hub", 90);
    delegate(&mut kernel, 4, "d3", "a3", "hub", 90);
    kernel.tick().expect("halt tick");
    assert!(kernel.projections().reflex.delegation_halt_active());

    run(
        &mut kernel,
        5,
        Command::RevokeDelegation {
            delegation_id: "d3".to_string(),
        },
    )
    .expect("revoke one");
    let events = kernel.tick().expect("deescalation tick");
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].kind,
        EventKind::DelegationConcentrationWarning { max_in_degree: 2, .. }
    ));
    assert!(!kernel.projections().reflex.delegation_halt_active());
}

#[test]
fn test_supplier_concentration_warning() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_with(&clock, SafetyPolicy::default());
    workspace(&mut kernel, 1);
    run(
        &mut kernel,
        2,
        Command::CreateLaw {
            law_id: "l1".to_string(),
            workspace_id: "w1".to_string(),
            title: "procurement act".to_string(),
            scope: "procurement".to_string(),
            reversibility: Reversibility::Reversible,
            checkpoints: Some(vec![365]),
            params: BTreeMap::new(),
        },
    )
    .expect("law");

    for (n, (id, cert)) in [("s1", "road"), ("s2", "rail")].iter().enumerate() {
        run(
            &mut kernel,
            10 + n as u128,
            Command::RegisterSupplier {
                supplier_id: id.to_string(),
                name: id.to_uppercase(),
                supplier_type: "construction".to_string(),
                max_contract_value: to_amount(1_000_000.0),
                certifications: BTreeSet::from([cert.to_string()]),
                years_in_business: 10,
                reputation_score: 0.9,
            },
        )
        .expect("supplier");
    }

    // Awards of 4:1 put the distribution exactly on the warn line (0.3).
    for (n, (tender, cert, value)) in [
        ("t1", "road", 4.0_f64),
        ("t2", "rail", 1.0_f64),
    ]
    .iter()
    .enumerate()
    {
        let base = 20 + (n as u128) * 10;
        run(
            &mut kernel,
            base,
            Command::CreateTender {
                tender_id: tender.to_string(),
                law_id: "l1".to_string(),
                title: format!("{} works", cert),
                estimated_value: to_amount(*value),
                required_capabilities: BTreeSet::from([cert.to_string()]),
                min_years_experience: None,
                min_reputation: None,
                selection_mechanism: SelectionMechanism::Rotation,
            },
        )
        .expect("tender");
        run(&mut kernel, base + 1, Command::OpenTender { tender_id: tender.to_string() })
            .expect("open");
        run(
            &mut kernel,
            base + 2,
            Command::AwardTender {
                tender_id: tender.to_string(),
                seed: format!("seed-{}", tender),
            },
        )
        .expect("award");
    }

    let events = kernel.tick().expect("tick");
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].kind,
        EventKind::SupplierConcentrationWarning { supplier_count: 2, .. }
    ));
}

#[test]
fn test_balance_and_overspend_audits_latch() {
    // These violations cannot be produced through the command surface
    // (the guards hold), so feed the projections corrupted events
    // directly and scan them.
    let now = start();
    let mut projections = ProjectionSet::new();
    let policy = SafetyPolicy::default();

    let base_event = |version: u64, kind: EventKind| crate::governance::events::Event {
        event_id: Uuid::from_u128(version as u128 + 1),
        stream_id: "budget:bad".to_string(),
        stream_type: crate::governance::events::StreamType::Budget,
        version,
        command_id: Uuid::from_u128(0x1000 + version as u128),
        occurred_at: now,
        actor_id: "corrupt".to_string(),
        kind,
    };

    // A budget whose recorded total disagrees with its items, and an
    // expenditure beyond the allocation.
    projections.apply(&base_event(
        1,
        EventKind::BudgetCreated {
            budget_id: "bad".to_string(),
            law_id: "l1".to_string(),
            fiscal_year: 2025,
            items: vec![BudgetItemInit {
                item_id: "x".to_string(),
                name: "X".to_string(),
                allocated_amount: to_amount(100.0),
                flex_class: FlexClass::Critical,
                category: "ops".to_string(),
            }],
            budget_total: to_amount(150.0),
        },
    ));
    projections.apply(&base_event(
        2,
        EventKind::BudgetActivated {
            budget_id: "bad".to_string(),
            activated_at: now,
        },
    ));
    projections.apply(&base_event(
        3,
        EventKind::ExpenditureApproved {
            budget_id: "bad".to_string(),
            item_id: "x".to_string(),
            amount: to_amount(120.0),
            memo: None,
        },
    ));

    let plan = plan_tick(now, &policy, &projections);
    assert_eq!(plan.event_count(), 2);
    let kinds: Vec<&EventKind> = plan
        .batches
        .iter()
        .flat_map(|(_, kinds)| kinds.iter())
        .collect();
    assert!(kinds
        .iter()
        .any(|k| matches!(k, EventKind::BudgetBalanceViolationDetected { .. })));
    assert!(kinds
        .iter()
        .any(|k| matches!(k, EventKind::BudgetOverspendDetected { .. })));

    // Once the reports are on the record, the same scan stays silent.
    let mut version = 10;
    for (stream_id, kinds) in &plan.batches {
        for kind in kinds {
            version += 1;
            let mut event = base_event(version, kind.clone());
            event.stream_id = stream_id.clone();
            event.stream_type = crate::governance::events::StreamType::System;
            projections.apply(&event);
        }
    }
    assert!(plan_tick(now, &policy, &projections).is_empty());
}
