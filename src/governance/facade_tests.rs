//! Façade Tests
//!
//! End-to-end command execution: version assignment, idempotent
//! replays, multi-event batches, startup rebuild, and the clock guard.

use crate::governance::amount::to_amount;
use crate::governance::clock::VirtualClock;
use crate::governance::commands::{Command, CommandEnvelope};
use crate::governance::error::KernelError;
use crate::governance::events::{EventKind, Reversibility, SelectionMechanism, TenderStatus};
use crate::governance::facade::GovernanceKernel;
use crate::governance::ids::SequentialIdSource;
use crate::governance::policy::SafetyPolicy;
use crate::governance::selector::seed_digest;
use crate::governance::sqlite_store::SqliteEventLog;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn cid(n: u128) -> Uuid {
    Uuid::from_u128((0xFAC4_u128 << 96) | n)
}

fn kernel_at(clock: &VirtualClock) -> GovernanceKernel {
    GovernanceKernel::in_memory(
        SafetyPolicy::default(),
        Box::new(clock.clone()),
        Box::new(SequentialIdSource::new()),
    )
    .expect("kernel construction")
}

fn create_workspace(n: u128) -> CommandEnvelope {
    CommandEnvelope::new(
        cid(n),
        "founder",
        Command::CreateWorkspace {
            workspace_id: "w1".to_string(),
            name: "grid".to_string(),
            parent_workspace_id: None,
            scope: BTreeMap::new(),
        },
    )
}

#[test]
fn test_versions_assigned_per_stream() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_at(&clock);

    let outcome = kernel.execute(create_workspace(1)).expect("create");
    assert_eq!(outcome.events[0].version, 1);

    let outcome = kernel
        .execute(CommandEnvelope::new(
            cid(2),
            "founder",
            Command::ArchiveWorkspace {
                workspace_id: "w1".to_string(),
            },
        ))
        .expect("archive");
    assert_eq!(outcome.events[0].version, 2);
    assert_eq!(outcome.events[0].stream_id, "workspace:w1");
}

#[test]
fn test_validation_error_appends_nothing() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_at(&clock);
    kernel.execute(create_workspace(1)).expect("create");

    // Second create of the same workspace is a validation failure.
    let err = kernel.execute(create_workspace(2)).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(kernel.load_all_events().expect("events").len(), 1);
}

#[test]
fn test_duplicate_command_id_coerced_to_success() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_at(&clock);

    let first = kernel.execute(create_workspace(1)).expect("first");
    let replay = kernel.execute(create_workspace(1)).expect("replay");

    assert_eq!(first.events.len(), 1);
    assert!(replay.events.is_empty());
    assert!(replay.deduplicated);
    assert_eq!(first.view, replay.view);
    assert_eq!(kernel.load_all_events().expect("events").len(), 1);
}

fn procurement_fixture(kernel: &mut GovernanceKernel) {
    let mut n = 100u128;
    let mut run = |kernel: &mut GovernanceKernel, command: Command| {
        n += 1;
        kernel
            .execute(CommandEnvelope::new(cid(n), "buyer", command))
            .expect("fixture command")
    };
    run(
        kernel,
        Command::CreateWorkspace {
            workspace_id: "w1".to_string(),
            name: "works".to_string(),
            parent_workspace_id: None,
            scope: BTreeMap::new(),
        },
    );
    run(
        kernel,
        Command::CreateLaw {
            law_id: "l1".to_string(),
            workspace_id: "w1".to_string(),
            title: "procurement act".to_string(),
            scope: "procurement".to_string(),
            reversibility: Reversibility::Reversible,
            checkpoints: Some(vec![365]),
            params: BTreeMap::new(),
        },
    );
    for id in ["s1", "s2"] {
        run(
            kernel,
            Command::RegisterSupplier {
                supplier_id: id.to_string(),
                name: id.to_uppercase(),
                supplier_type: "construction".to_string(),
                max_contract_value: to_amount(100_000.0),
                certifications: BTreeSet::from(["grid".to_string()]),
                years_in_business: 8,
                reputation_score: 0.7,
            },
        );
    }
    run(
        kernel,
        Command::CreateTender {
            tender_id: "t1".to_string(),
            law_id: "l1".to_string(),
            title: "substation".to_string(),
            estimated_value: to_amount(40_000.0),
            required_capabilities: BTreeSet::from(["grid".to_string()]),
            min_years_experience: None,
            min_reputation: None,
            selection_mechanism: SelectionMechanism::Random,
        },
    );
    run(kernel, Command::OpenTender { tender_id: "t1".to_string() });
}

#[test]
fn test_award_emits_multi_event_batch() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_at(&clock);
    procurement_fixture(&mut kernel);

    let outcome = kernel
        .execute(CommandEnvelope::new(
            cid(1),
            "buyer",
            Command::AwardTender {
                tender_id: "t1".to_string(),
                seed: "tender-42".to_string(),
            },
        ))
        .expect("award");

    assert_eq!(outcome.events.len(), 2);
    assert!(matches!(outcome.events[0].kind, EventKind::TenderEvaluated { .. }));
    assert!(matches!(outcome.events[1].kind, EventKind::TenderAwarded { .. }));
    // Consecutive versions on one stream, distinct command ids.
    assert_eq!(outcome.events[0].version + 1, outcome.events[1].version);
    assert_ne!(outcome.events[0].command_id, outcome.events[1].command_id);
    assert_eq!(outcome.events[0].command_id, cid(1));

    let tender = kernel.tender("t1").expect("tender");
    assert_eq!(tender.status, TenderStatus::Awarded);
    assert_eq!(tender.seed.as_deref(), Some("tender-42"));
    assert_eq!(
        tender.feasible_set.as_deref(),
        Some(&["s1".to_string(), "s2".to_string()][..])
    );

    // The recorded digest re-derives the selection.
    if let EventKind::TenderAwarded {
        seed_digest: digest,
        supplier_id,
        ..
    } = &outcome.events[1].kind
    {
        assert_eq!(digest, &seed_digest("tender-42"));
        let winner = kernel.supplier(supplier_id).expect("winner");
        assert_eq!(winner.total_value_awarded, to_amount(40_000.0));
    }

    // The award derived a contract record.
    assert_eq!(kernel.projections().contracts.len(), 1);
    let contract = kernel
        .projections()
        .contracts
        .contract("contract:t1")
        .expect("contract");
    assert_eq!(contract.law_id, "l1");
    assert_eq!(contract.value, to_amount(40_000.0));
    assert_eq!(
        kernel
            .projections()
            .contracts
            .for_supplier(&contract.supplier_id)
            .len(),
        1
    );
    assert_eq!(
        kernel
            .projections()
            .tenders
            .list_by_status(TenderStatus::Awarded)
            .len(),
        1
    );
}

#[test]
fn test_award_without_feasible_supplier_is_an_error() {
    let clock = VirtualClock::new(start());
    let mut kernel = kernel_at(&clock);
    procurement_fixture(&mut kernel);

    // A tender nothing can satisfy.
    kernel
        .execute(CommandEnvelope::new(
            cid(1),
            "buyer",
            Command::CreateTender {
                tender_id: "t2".to_string(),
                law_id: "l1".to_string(),
                title: "moon elevator".to_string(),
                estimated_value: to_amount(900_000.0),
                required_capabilities: BTreeSet::from(["grid".to_string()]),
                min_years_experience: None,
                min_reputation: None,
                selection_mechanism: SelectionMechanism::Rotation,
            },
        ))
        .expect("tender");
    kernel
        .execute(CommandEnvelope::new(
            cid(2),
            "buyer",
            Command::OpenTender {
                tender_id: "t2".to_string(),
            },
        ))
        .expect("open");

    let err = kernel
        .execute(CommandEnvelope::new(
            cid(3),
            "buyer",
            Command::AwardTender {
                tender_id: "t2".to_string(),
                seed: "s".to_string(),
            },
        ))
        .unwrap_err();
    assert!(matches!(err, KernelError::NoFeasibleSupplier { .. }));
    // Nothing moved: the tender is still open for a retry.
    assert_eq!(kernel.tender("t2").unwrap().status, TenderStatus::Open);
}

#[test]
fn test_startup_rebuild_from_durable_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("kernel.db");
    let clock = VirtualClock::new(start());

    {
        let log = SqliteEventLog::open(&db_path).expect("open");
        let mut kernel = GovernanceKernel::new(
            Box::new(log),
            SafetyPolicy::default(),
            Box::new(clock.clone()),
            Box::new(SequentialIdSource::new()),
        )
        .expect("kernel");
        procurement_fixture(&mut kernel);
    }

    let log = SqliteEventLog::open(&db_path).expect("reopen");
    let kernel = GovernanceKernel::new(
        Box::new(log),
        SafetyPolicy::default(),
        Box::new(clock.clone()),
        Box::new(SequentialIdSource::new()),
    )
    .expect("kernel after restart");

    assert!(kernel.workspace("w1").is_some());
    assert_eq!(kernel.tender("t1").unwrap().status, TenderStatus::Open);
    assert_eq!(kernel.projections().suppliers.len(), 2);
}

#[test]
fn test_clock_regression_surfaces() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("kernel.db");

    {
        let clock = VirtualClock::new(start() + chrono::Duration::days(10));
        let log = SqliteEventLog::open(&db_path).expect("open");
        let mut kernel = GovernanceKernel::new(
            Box::new(log),
            SafetyPolicy::default(),
            Box::new(clock.clone()),
            Box::new(SequentialIdSource::new()),
        )
        .expect("kernel");
        kernel.execute(create_workspace(1)).expect("create");
    }

    // Restart with a clock earlier than the newest stored event.
    let clock = VirtualClock::new(start());
    let log = SqliteEventLog::open(&db_path).expect("reopen");
    let mut kernel = GovernanceKernel::new(
        Box::new(log),
        SafetyPolicy::default(),
        Box::new(clock.clone()),
        Box::new(SequentialIdSource::new()),
    )
    .expect("kernel");
    let err = kernel
        .execute(CommandEnvelope::new(
            cid(2),
            "founder",
            Command::ArchiveWorkspace {
                workspace_id: "w1".to_string(),
            },
        ))
        .unwrap_err();
    assert!(matches!(err, KernelError::ClockRegression { .. }));
}

#[test]
fn test_freedom_health_low_on_empty_kernel() {
    let clock = VirtualClock::new(start());
    let kernel = kernel_at(&clock);
    let health = kernel.freedom_health();
    assert_eq!(health.risk.as_code(), 0);
    assert_eq!(health.delegation_gini, 0.0);
    assert_eq!(health.overdue_reviews, 0);
}
