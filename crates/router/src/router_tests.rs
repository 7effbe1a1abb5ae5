// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use xorca_core::machine::{MachineBehavior, MachineDefinition, StateNode, TransitionDef};
use xorca_core::{FakeClock, FixedIdGen};
use xorca_storage::test_support::ContendedStore;
use xorca_storage::MemoryStore;

use crate::ErrorPayload;

fn machine(version: Version) -> Arc<Machine> {
    let def = MachineDefinition::new("summary", version)
        .initial("FetchData")
        .state(
            "FetchData",
            StateNode::compound().emit_topic("cmd.book.fetch").on(
                "evt.book.fetch.success",
                TransitionDef::to("Done").action("updateContext"),
            ),
        )
        .state("Done", StateNode::final_state().emit_topic("notif.done"));
    Arc::new(Machine::compile(def, MachineBehavior::new()).unwrap())
}

fn router(store: Arc<MemoryStore>) -> Router<MemoryStore, FakeClock> {
    Router::new(
        "summary",
        vec![MachineRegistration::new(machine(Version::new(1, 0, 0)))],
        store,
        FakeClock::new(),
    )
    .unwrap()
    .with_init_schema(json!({
        "type": "object",
        "properties": { "bookId": { "type": "string" } },
        "required": ["bookId"],
    }))
    .unwrap()
    .with_ids(Arc::new(FixedIdGen::new("gen")))
}

fn start_envelope(data: Value) -> Envelope {
    Envelope::builder("in-start", "xorca.summary.start", "/client/").data(data).build()
}

fn event_envelope(event_type: &str, subject: &str, data: Value) -> Envelope {
    Envelope::builder("in-evt", event_type, "/fleet/")
        .subject(subject)
        .data(data)
        .build()
}

fn error_payload(envelope: &Envelope) -> ErrorPayload {
    serde_json::from_value(envelope.data.clone()).unwrap()
}

#[test]
fn duplicate_versions_fail_construction() {
    let err = Router::new(
        "summary",
        vec![
            MachineRegistration::new(machine(Version::new(1, 0, 0))),
            MachineRegistration::new(machine(Version::new(1, 0, 0))),
        ],
        Arc::new(MemoryStore::new()),
        FakeClock::new(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, RouterError::DuplicateMachineVersion(v) if v == "1.0.0"));
}

#[tokio::test]
async fn init_creates_a_snapshot_and_emits() {
    let store = Arc::new(MemoryStore::new());
    let router = router(store.clone());

    let out = router
        .route(vec![start_envelope(json!({
            "processId": "P1",
            "context": {"bookId": "b.pdf"},
            "version": "1.0.0",
        }))])
        .await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event_type, "cmd.book.fetch");
    assert_eq!(out[0].data, json!({"bookId": "b.pdf"}));
    let subject = out[0].subject.clone().unwrap();
    let decoded = Subject::decode(&subject).unwrap();
    assert_eq!(decoded.process_id, "P1");
    assert_eq!(decoded.name, "summary");
    assert_eq!(decoded.version, "1.0.0");
    assert!(store.blob(&decoded.storage_key()).is_some());
}

#[tokio::test]
async fn init_mints_a_process_id_when_absent() {
    let store = Arc::new(MemoryStore::new());
    let router = router(store);
    let out = router
        .route(vec![start_envelope(json!({"context": {"bookId": "b"}}))])
        .await;
    let decoded = Subject::decode(out[0].subject.as_deref().unwrap()).unwrap();
    assert_eq!(decoded.process_id, "gen-1");
}

#[tokio::test]
async fn init_without_version_selects_the_highest() {
    let store = Arc::new(MemoryStore::new());
    let router = Router::new(
        "summary",
        vec![
            MachineRegistration::new(machine(Version::new(1, 0, 0))),
            MachineRegistration::new(machine(Version::new(1, 2, 0))),
        ],
        store,
        FakeClock::new(),
    )
    .unwrap()
    .with_ids(Arc::new(FixedIdGen::new("gen")));

    let out = router
        .route(vec![start_envelope(json!({"context": {"bookId": "b"}}))])
        .await;
    let decoded = Subject::decode(out[0].subject.as_deref().unwrap()).unwrap();
    assert_eq!(decoded.version, "1.2.0");
    assert_eq!(out[0].statemachineversion.as_deref(), Some("1.2.0"));
}

#[tokio::test]
async fn double_init_yields_subject_already_exists() {
    let store = Arc::new(MemoryStore::new());
    let router = router(store);
    let start = || {
        start_envelope(json!({
            "processId": "P1",
            "context": {"bookId": "b.pdf"},
        }))
    };

    let first = router.route(vec![start()]).await;
    assert_eq!(first[0].event_type, "cmd.book.fetch");

    let second = router.route(vec![start()]).await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].event_type, "xorca.summary.start.error");
    let payload = error_payload(&second[0]);
    assert_eq!(payload.error_name, "SubjectAlreadyExists");
    assert!(payload.error_message.contains("already exists"));
}

#[tokio::test]
async fn bad_content_type_fails_before_any_store_access() {
    let store = Arc::new(MemoryStore::new());
    let router = router(store.clone());

    let mut envelope = start_envelope(json!({"context": {"bookId": "b"}}));
    envelope.datacontenttype = "application/xml".into();
    let out = router.route(vec![envelope]).await;

    assert_eq!(out[0].event_type, "sys.xorca.summary.start.error");
    assert_eq!(error_payload(&out[0]).error_name, "InvalidContentType");
    assert_eq!(store.op_count(), 0);
}

#[tokio::test]
async fn init_schema_violation_mints_no_subject() {
    let store = Arc::new(MemoryStore::new());
    let router = router(store.clone());

    let out = router
        .route(vec![start_envelope(json!({
            "processId": "P2",
            "context": {"bookId2": "x"},
        }))])
        .await;

    assert_eq!(out[0].event_type, "sys.xorca.summary.start.error");
    assert_eq!(error_payload(&out[0]).error_name, "SchemaViolation");
    assert_eq!(store.blob_count(), 0);
}

#[tokio::test]
async fn continuation_advances_the_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let router = router(store.clone());
    let started = router
        .route(vec![start_envelope(json!({
            "processId": "P1",
            "context": {"bookId": "b.pdf"},
        }))])
        .await;
    let subject = started[0].subject.clone().unwrap();

    let out = router
        .route(vec![event_envelope(
            "evt.book.fetch.success",
            &subject,
            json!({"bookData": ["x"]}),
        )])
        .await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event_type, "notif.done");
    assert_eq!(out[0].subject.as_deref(), Some(subject.as_str()));
    let index = store.index_of(&format!("{subject}.json")).unwrap();
    assert_eq!(index.status.as_deref(), Some("done"));
}

#[tokio::test]
async fn continuation_with_undecodable_subject_is_a_sys_error() {
    let router = router(Arc::new(MemoryStore::new()));
    let out = router
        .route(vec![event_envelope("evt.book.fetch.success", "!!junk!!", json!({}))])
        .await;
    assert_eq!(out[0].event_type, "sys.xorca.orchestrator.summary.error");
    assert_eq!(error_payload(&out[0]).error_name, "InvalidSubject");
}

#[tokio::test]
async fn continuation_for_unknown_subject_is_not_initialized() {
    let router = router(Arc::new(MemoryStore::new()));
    let subject = Subject::new("ghost", "summary", "1.0.0").encode();
    let out = router
        .route(vec![event_envelope("evt.book.fetch.success", &subject, json!({}))])
        .await;
    assert_eq!(out[0].event_type, "xorca.orchestrator.summary.error");
    assert_eq!(error_payload(&out[0]).error_name, "SubjectNotInitialized");
}

#[tokio::test]
async fn continuation_with_foreign_name_raises_or_drops() {
    let foreign = Subject::new("P1", "other", "1.0.0").encode();
    let event = event_envelope("evt.book.fetch.success", &foreign, json!({}));

    let raising = router(Arc::new(MemoryStore::new()));
    let out = raising.route(vec![event.clone()]).await;
    assert_eq!(out[0].event_type, "xorca.orchestrator.summary.error");
    assert_eq!(error_payload(&out[0]).error_name, "InvalidOrchestratorName");

    let dropping = router(Arc::new(MemoryStore::new())).with_config(RouterConfig {
        raise_on_invalid_orchestrator_name: false,
        ..RouterConfig::default()
    });
    assert!(dropping.route(vec![event]).await.is_empty());
}

#[tokio::test]
async fn continuation_with_unknown_version_is_a_hard_error() {
    let router = router(Arc::new(MemoryStore::new()));
    let subject = Subject::new("P1", "summary", "9.9.9").encode();
    let out = router
        .route(vec![event_envelope("evt.book.fetch.success", &subject, json!({}))])
        .await;
    assert_eq!(error_payload(&out[0]).error_name, "UnknownMachineVersion");
}

#[tokio::test]
async fn version_mismatch_leaves_the_snapshot_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let router = router(store.clone());
    let started = router
        .route(vec![start_envelope(json!({
            "processId": "P1",
            "context": {"bookId": "b.pdf"},
        }))])
        .await;
    let subject = started[0].subject.clone().unwrap();
    let before = store.blob(&format!("{subject}.json")).unwrap();

    let mut event = event_envelope("evt.book.fetch.success", &subject, json!({}));
    event.statemachineversion = Some("2.0.0".into());
    let out = router.route(vec![event]).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event_type, "xorca.orchestrator.summary.error");
    assert_eq!(error_payload(&out[0]).error_name, "VersionMismatch");
    assert_eq!(store.blob(&format!("{subject}.json")).unwrap(), before);
}

#[tokio::test]
async fn outbound_types_are_unroutable_on_input() {
    let test_router = router(Arc::new(MemoryStore::new()));
    let out = test_router
        .route(vec![event_envelope("cmd.book.fetch", "irrelevant", json!({}))])
        .await;
    assert_eq!(out[0].event_type, "sys.xorca.orchestrator.summary.error");
    assert_eq!(error_payload(&out[0]).error_name, "UnroutableEvent");

    let dropping = router(Arc::new(MemoryStore::new())).with_config(RouterConfig {
        error_on_not_found: false,
        ..RouterConfig::default()
    });
    assert!(dropping
        .route(vec![event_envelope("cmd.book.fetch", "irrelevant", json!({}))])
        .await
        .is_empty());
}

#[tokio::test]
async fn a_group_processes_events_in_input_order() {
    let machine = {
        let def = MachineDefinition::new("summary", Version::new(1, 0, 0))
            .initial("A")
            .state("A", StateNode::compound().on("evt.one", TransitionDef::to("B")))
            .state(
                "B",
                StateNode::compound()
                    .emit_topic("cmd.b")
                    .on("evt.two", TransitionDef::to("C")),
            )
            .state("C", StateNode::final_state().emit_topic("notif.c"));
        Arc::new(Machine::compile(def, MachineBehavior::new()).unwrap())
    };
    let router = Router::new(
        "summary",
        vec![MachineRegistration::new(machine)],
        Arc::new(MemoryStore::new()),
        FakeClock::new(),
    )
    .unwrap()
    .with_ids(Arc::new(FixedIdGen::new("gen")));

    let started = router
        .route(vec![start_envelope(json!({"processId": "P1", "context": {}}))])
        .await;
    assert!(started.is_empty());
    let subject = Subject::new("P1", "summary", "1.0.0").encode();

    let out = router
        .route(vec![
            event_envelope("evt.one", &subject, json!({})),
            event_envelope("evt.two", &subject, json!({})),
        ])
        .await;
    let types: Vec<&str> = out.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["cmd.b", "notif.c"]);
}

#[tokio::test]
async fn system_errors_are_recorded_and_produce_nothing() {
    let store = Arc::new(MemoryStore::new());
    let router = router(store.clone());
    let started = router
        .route(vec![start_envelope(json!({
            "processId": "P1",
            "context": {"bookId": "b.pdf"},
        }))])
        .await;
    let subject = started[0].subject.clone().unwrap();

    let sys = Envelope::builder("in-sys", "sys.xorca.summary.start.error", "/router/")
        .subject(subject.clone())
        .data(json!({"errorMessage": "schema failure upstream"}))
        .build();
    let out = router.route(vec![sys]).await;
    assert!(out.is_empty());

    let blob = store.blob(&format!("{subject}.json")).unwrap();
    let snapshot = xorca_core::Snapshot::decode(&blob).unwrap();
    assert_eq!(snapshot.logs.len(), 1);
    assert_eq!(snapshot.logs[0].event_type, "sys.xorca.summary.start.error");
}

#[tokio::test]
async fn lock_exhaustion_surfaces_as_timeout_error() {
    let store = Arc::new(ContendedStore::new(MemoryStore::new()));
    let router = Router::new(
        "summary",
        vec![MachineRegistration::new(machine(Version::new(1, 0, 0)))],
        store,
        FakeClock::new(),
    )
    .unwrap()
    .with_config(RouterConfig {
        lock_budget: xorca_storage::LockBudget {
            timeout: std::time::Duration::from_millis(20),
            retry_delay: std::time::Duration::from_millis(10),
        },
        ..RouterConfig::default()
    });

    let subject = Subject::new("P1", "summary", "1.0.0").encode();
    let out = router
        .route(vec![event_envelope("evt.book.fetch.success", &subject, json!({}))])
        .await;
    assert_eq!(out[0].event_type, "xorca.orchestrator.summary.error");
    assert_eq!(error_payload(&out[0]).error_name, "LockAcquisitionTimeout");
}
