// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios over the full stack: router → orchestration actor
//! → persistent actor → interpreter → in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};
use xorca_core::machine::{Machine, MachineBehavior, MachineDefinition, StateNode, TransitionDef};
use xorca_core::{Envelope, FakeClock, FixedIdGen, OrchestrationStatus, Snapshot, Subject};
use xorca_router::{ErrorPayload, MachineRegistration, Router, RouterConfig};
use xorca_storage::{LockBudget, MemoryStore};

/// The book-summarization machine: fetch the book, summarize it, run two
/// regulation checks in parallel, then finish.
fn summary_machine() -> Arc<Machine> {
    let def = MachineDefinition::new("summary", semver::Version::new(1, 0, 0))
        .initial("FetchData")
        .state(
            "FetchData",
            StateNode::compound().emit_topic("cmd.book.fetch").on(
                "evt.book.fetch.success",
                TransitionDef::to("Summarize").action("updateContext"),
            ),
        )
        .state(
            "Summarize",
            StateNode::compound().emit_handler("emitSummaryRequest").on(
                "evt.gpt.summary.success",
                TransitionDef::to("Regulate").action("updateContext"),
            ),
        )
        .state(
            "Regulate",
            StateNode::parallel()
                .on_done(TransitionDef::to("Done"))
                .state(
                    "Grounded",
                    StateNode::compound()
                        .initial("Check")
                        .state(
                            "Check",
                            StateNode::compound().emit_topic("cmd.regulations.grounded").on(
                                "evt.regulations.grounded.success",
                                TransitionDef::to("Regulate.Grounded.Ok"),
                            ),
                        )
                        .state("Ok", StateNode::final_state()),
                )
                .state(
                    "Compliant",
                    StateNode::compound()
                        .initial("Check")
                        .state(
                            "Check",
                            StateNode::compound().emit_topic("cmd.regulations.compliant").on(
                                "evt.regulations.compliant.success",
                                TransitionDef::to("Regulate.Compliant.Ok"),
                            ),
                        )
                        .state("Ok", StateNode::final_state()),
                ),
        )
        .state("Done", StateNode::final_state().emit_topic("notif.done"));

    let behavior = MachineBehavior::new().emitter("emitSummaryRequest", |ctx, _| {
        let content = ctx.get("bookData").cloned().unwrap_or(Value::Null);
        Ok(("cmd.gpt.summary".to_string(), json!({ "content": content })))
    });
    Arc::new(Machine::compile(def, behavior).unwrap())
}

fn summary_router(store: Arc<MemoryStore>) -> Router<MemoryStore, FakeClock> {
    Router::new(
        "summary",
        vec![MachineRegistration::new(summary_machine())],
        store,
        FakeClock::new(),
    )
    .unwrap()
    .with_init_schema(json!({
        "type": "object",
        "properties": { "bookId": { "type": "string" } },
        "required": ["bookId"],
        "additionalProperties": true,
    }))
    .unwrap()
    .with_ids(Arc::new(FixedIdGen::new("id")))
}

fn start(data: Value) -> Envelope {
    Envelope::builder("start-1", "xorca.summary.start", "/client/").data(data).build()
}

fn event(event_type: &str, subject: &str, data: Value) -> Envelope {
    Envelope::builder("evt-1", event_type, "/fleet/").subject(subject).data(data).build()
}

fn payload(envelope: &Envelope) -> ErrorPayload {
    serde_json::from_value(envelope.data.clone()).unwrap()
}

fn stored_snapshot(store: &MemoryStore, subject: &str) -> Snapshot {
    Snapshot::decode(&store.blob(&format!("{subject}.json")).unwrap()).unwrap()
}

// -- scenario 1: happy path ------------------------------------------------

#[tokio::test]
async fn happy_path_runs_the_summary_to_done() {
    let store = Arc::new(MemoryStore::new());
    let router = summary_router(store.clone());

    // init: fetch command carries the initial context
    let out = router
        .route(vec![start(json!({
            "processId": "P1",
            "context": {"bookId": "b.pdf"},
            "version": "1.0.0",
        }))])
        .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event_type, "cmd.book.fetch");
    assert_eq!(out[0].data, json!({"bookId": "b.pdf"}));
    let subject = out[0].subject.clone().unwrap();

    // every outbound envelope of the run inherits the minted subject
    let assert_subject = |envelopes: &[Envelope]| {
        for envelope in envelopes {
            assert_eq!(envelope.subject.as_deref(), Some(subject.as_str()));
        }
    };
    assert_subject(&out);

    // book fetched: summarization command carries the book content
    let out = router
        .route(vec![event(
            "evt.book.fetch.success",
            &subject,
            json!({"bookData": ["x", "y"]}),
        )])
        .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event_type, "cmd.gpt.summary");
    assert_eq!(out[0].data, json!({"content": ["x", "y"]}));
    assert_subject(&out);

    // summarized: both regulation checks fan out
    let out = router
        .route(vec![event("evt.gpt.summary.success", &subject, json!({"summary": "s"}))])
        .await;
    let types: Vec<&str> = out.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["cmd.regulations.grounded", "cmd.regulations.compliant"]);
    assert_subject(&out);

    // first region closes silently
    let out = router
        .route(vec![event("evt.regulations.compliant.success", &subject, json!({}))])
        .await;
    assert!(out.is_empty());

    // second region closes: the orchestration completes
    let out = router
        .route(vec![event("evt.regulations.grounded.success", &subject, json!({}))])
        .await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event_type, "notif.done");
    assert_subject(&out);

    let snapshot = stored_snapshot(&store, &subject);
    assert_eq!(snapshot.status, OrchestrationStatus::Done);
    // notif.done carried the final context
    assert_eq!(
        out[0].data,
        Value::Object(snapshot.context.public())
    );
    assert_eq!(
        snapshot.context.get("bookData"),
        Some(&json!(["x", "y"]))
    );
    assert_eq!(snapshot.context.get("summary"), Some(&json!("s")));
}

// -- scenario 2: unknown events are ignored --------------------------------

#[tokio::test]
async fn unknown_event_grows_history_and_nothing_else() {
    let store = Arc::new(MemoryStore::new());
    let router = summary_router(store.clone());
    let out = router
        .route(vec![start(json!({"processId": "P1", "context": {"bookId": "b.pdf"}}))])
        .await;
    let subject = out[0].subject.clone().unwrap();
    let before = stored_snapshot(&store, &subject);

    let out = router
        .route(vec![event("evt.irrelevant.success", &subject, json!({}))])
        .await;

    assert!(out.is_empty());
    let after = stored_snapshot(&store, &subject);
    assert_eq!(after.value, before.value);
    assert_eq!(after.context.public(), before.context.public());
    assert_eq!(after.history.len(), before.history.len() + 1);
}

// -- scenario 3: version mismatch ------------------------------------------

#[tokio::test]
async fn version_mismatch_is_a_single_error_envelope() {
    let store = Arc::new(MemoryStore::new());
    let router = summary_router(store.clone());
    let out = router
        .route(vec![start(json!({"processId": "P1", "context": {"bookId": "b.pdf"}}))])
        .await;
    let subject = out[0].subject.clone().unwrap();
    let before = stored_snapshot(&store, &subject);

    let mut mismatched = event("evt.book.fetch.success", &subject, json!({"bookData": []}));
    mismatched.statemachineversion = Some("2.0.0".into());
    let out = router.route(vec![mismatched]).await;

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event_type, "xorca.orchestrator.summary.error");
    assert_eq!(payload(&out[0]).error_name, "VersionMismatch");
    assert_eq!(stored_snapshot(&store, &subject).value, before.value);
}

// -- scenario 4: double init -----------------------------------------------

#[tokio::test]
async fn second_init_for_the_same_process_fails() {
    let router = summary_router(Arc::new(MemoryStore::new()));
    let data = json!({"processId": "P1", "context": {"bookId": "b.pdf"}});

    let first = router.route(vec![start(data.clone())]).await;
    assert_eq!(first[0].event_type, "cmd.book.fetch");

    let second = router.route(vec![start(data)]).await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].event_type, "xorca.summary.start.error");
    let payload = payload(&second[0]);
    assert_eq!(payload.error_name, "SubjectAlreadyExists");
    assert!(payload.error_message.contains("already exists"));
}

// -- scenario 5: bad content type ------------------------------------------

#[tokio::test]
async fn bad_content_type_never_reaches_the_store() {
    let store = Arc::new(MemoryStore::new());
    let router = summary_router(store.clone());

    let mut envelope = start(json!({"context": {"bookId": "b"}}));
    envelope.datacontenttype = "application/xml".into();
    let out = router.route(vec![envelope]).await;

    assert_eq!(out.len(), 1);
    assert!(out[0].event_type.starts_with("sys."));
    assert_eq!(payload(&out[0]).error_name, "InvalidContentType");
    assert_eq!(store.op_count(), 0);
}

// -- scenario 6: init schema violation -------------------------------------

#[tokio::test]
async fn init_schema_violation_mints_nothing() {
    let store = Arc::new(MemoryStore::new());
    let router = summary_router(store.clone());

    let out = router
        .route(vec![start(json!({"processId": "P2", "context": {"bookId2": "x"}}))])
        .await;

    assert_eq!(out[0].event_type, "sys.xorca.summary.start.error");
    assert_eq!(payload(&out[0]).error_name, "SchemaViolation");
    assert_eq!(store.blob_count(), 0);
}

// -- properties ------------------------------------------------------------

proptest! {
    #[test]
    fn subject_round_trip(
        process_id in "[a-zA-Z0-9-]{1,24}",
        name in "[a-z]{1,12}",
        version in "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
    ) {
        let subject = Subject::new(&process_id, &name, &version);
        prop_assert_eq!(Subject::decode(&subject.encode()).unwrap(), subject);
    }
}

#[tokio::test]
async fn identical_runs_produce_identical_blobs() {
    let run = || async {
        let store = Arc::new(MemoryStore::new());
        let router = summary_router(store.clone());
        let out = router
            .route(vec![start(json!({"processId": "P1", "context": {"bookId": "b.pdf"}}))])
            .await;
        let subject = out[0].subject.clone().unwrap();
        router
            .route(vec![event("evt.book.fetch.success", &subject, json!({"bookData": ["x"]}))])
            .await;
        store.blob(&format!("{subject}.json")).unwrap()
    };
    assert_eq!(run().await, run().await);
}

#[tokio::test]
async fn concurrent_activations_on_one_subject_lose_no_updates() {
    let def = MachineDefinition::new("marks", semver::Version::new(1, 0, 0)).state(
        "Open",
        StateNode::compound()
            .on("evt.mark", TransitionDef::to("Open").action("updateContext")),
    );
    let machine = Arc::new(Machine::compile(def, MachineBehavior::new()).unwrap());
    let store = Arc::new(MemoryStore::new());
    let router = Arc::new(
        Router::new("marks", vec![MachineRegistration::new(machine)], store.clone(), FakeClock::new())
            .unwrap()
            .with_config(RouterConfig {
                lock_budget: LockBudget {
                    timeout: std::time::Duration::from_millis(2_000),
                    retry_delay: std::time::Duration::from_millis(5),
                },
                ..RouterConfig::default()
            }),
    );

    router
        .route(vec![start_named("marks", json!({"processId": "P1", "context": {}}))])
        .await;
    let subject = Subject::new("P1", "marks", "1.0.0").encode();

    let left = {
        let router = Arc::clone(&router);
        let subject = subject.clone();
        tokio::spawn(async move {
            router.route(vec![event("evt.mark", &subject, json!({"left": 1}))]).await
        })
    };
    let right = {
        let router = Arc::clone(&router);
        let subject = subject.clone();
        tokio::spawn(async move {
            router.route(vec![event("evt.mark", &subject, json!({"right": 2}))]).await
        })
    };
    let (left, right) = (left.await.unwrap(), right.await.unwrap());
    assert!(left.is_empty() && right.is_empty());

    let snapshot = stored_snapshot(&store, &subject);
    // both updates landed; neither overwrote the other
    assert_eq!(snapshot.context.get("left"), Some(&json!(1)));
    assert_eq!(snapshot.context.get("right"), Some(&json!(2)));
    assert_eq!(snapshot.history.len(), 3);
}

#[tokio::test]
async fn concurrent_inits_agree_on_a_single_winner() {
    let router = Arc::new(summary_router(Arc::new(MemoryStore::new())));
    let data = json!({"processId": "P1", "context": {"bookId": "b.pdf"}});

    let spawn = |router: Arc<Router<MemoryStore, FakeClock>>, data: Value| {
        tokio::spawn(async move { router.route(vec![start(data)]).await })
    };
    let a = spawn(Arc::clone(&router), data.clone());
    let b = spawn(router, data);
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let types: Vec<&str> =
        a.iter().chain(b.iter()).map(|e| e.event_type.as_str()).collect();
    assert_eq!(types.len(), 2);
    assert!(types.contains(&"cmd.book.fetch"));
    assert!(types.contains(&"xorca.summary.start.error"));
}

fn start_named(name: &str, data: Value) -> Envelope {
    Envelope::builder("start-1", &format!("xorca.{name}.start"), "/client/")
        .data(data)
        .build()
}
