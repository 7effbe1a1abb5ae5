// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    start = { "xorca.summary.start" },
    event = { "evt.book.fetch.success" },
    command = { "cmd.book.fetch" },
    notification = { "notif.done" },
    start_error = { "xorca.summary.start.error" },
    orchestrator_error = { "xorca.orchestrator.summary.error" },
    sys_start_error = { "sys.xorca.summary.start.error" },
    sys_orchestrator_error = { "sys.xorca.orchestrator.summary.error" },
)]
fn parse_display_round_trip(s: &str) {
    let topic = Topic::parse(s).unwrap();
    assert_eq!(topic.to_string(), s);
}

#[parameterized(
    empty = { "" },
    bare_xorca = { "xorca." },
    bare_start = { "xorca..start" },
    bare_evt = { "evt." },
    unknown_prefix = { "foo.bar" },
    sys_of_event = { "sys.evt.thing" },
    sys_of_command = { "sys.cmd.thing" },
    orchestrator_no_error = { "xorca.orchestrator.summary" },
    plain_error = { "xorca.summary.error" },
)]
fn parse_rejects_out_of_grammar(s: &str) {
    assert_eq!(Topic::parse(s), None);
}

#[test]
fn start_error_wins_over_start() {
    // The `.start.error` suffix must not classify as a start of
    // name "summary.start".
    assert_eq!(
        Topic::parse("xorca.summary.start.error"),
        Some(Topic::StartError { name: "summary".into() })
    );
}

#[test]
fn inbound_classification() {
    assert!(Topic::parse("xorca.summary.start").unwrap().is_inbound());
    assert!(Topic::parse("evt.thing").unwrap().is_inbound());
    assert!(Topic::parse("sys.xorca.summary.start.error").unwrap().is_inbound());
    assert!(!Topic::parse("cmd.thing").unwrap().is_inbound());
    assert!(!Topic::parse("notif.thing").unwrap().is_inbound());
    assert!(!Topic::parse("xorca.summary.start.error").unwrap().is_inbound());
}
