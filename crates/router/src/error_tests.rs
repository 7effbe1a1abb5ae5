// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use xorca_core::EnvelopeError;

#[test]
fn taxonomy_names_are_stable() {
    let cases: Vec<(RouterError, &str)> = vec![
        (RouterError::DuplicateMachineVersion("1.0.0".into()), "DuplicateMachineVersion"),
        (RouterError::UnknownMachineVersion("9.9.9".into()), "UnknownMachineVersion"),
        (RouterError::SubjectAlreadyExists("s".into()), "SubjectAlreadyExists"),
        (RouterError::UnroutableEvent("cmd.x".into()), "UnroutableEvent"),
        (RouterError::MissingSubject, "InvalidSubject"),
        (RouterError::MalformedInitPayload("m".into()), "SchemaViolation"),
        (
            RouterError::Envelope(EnvelopeError::InvalidContentType("application/xml".into())),
            "InvalidContentType",
        ),
        (
            RouterError::Actor(ActorError::VersionMismatch {
                requested: "2.0.0".into(),
                actual: "1.0.0".into(),
            }),
            "VersionMismatch",
        ),
        (
            RouterError::Actor(ActorError::NotInitialized("s".into())),
            "SubjectNotInitialized",
        ),
        (
            RouterError::Actor(ActorError::Store(StoreError::LockTimeout {
                key: "k".into(),
                waited_ms: 5000,
            })),
            "LockAcquisitionTimeout",
        ),
        (
            RouterError::Actor(ActorError::Store(StoreError::Backend("io".into()))),
            "StoreFailure",
        ),
    ];
    for (err, name) in cases {
        assert_eq!(err.error_name(), name, "for {err}");
    }
}

#[test]
fn preprocessing_split_matches_the_topic_table() {
    assert!(RouterError::MissingSubject.is_preprocessing());
    assert!(RouterError::MalformedInitPayload("m".into()).is_preprocessing());
    assert!(RouterError::Envelope(EnvelopeError::InvalidContentType("t".into()))
        .is_preprocessing());
    assert!(RouterError::UnroutableEvent("cmd.x".into()).is_preprocessing());

    assert!(!RouterError::SubjectAlreadyExists("s".into()).is_preprocessing());
    assert!(!RouterError::UnknownMachineVersion("1.0.0".into()).is_preprocessing());
    assert!(!RouterError::Actor(ActorError::NotInitialized("s".into())).is_preprocessing());
    assert!(!RouterError::Actor(ActorError::Store(StoreError::LockTimeout {
        key: "k".into(),
        waited_ms: 1
    }))
    .is_preprocessing());
}
