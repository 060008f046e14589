//! End-to-end behaviour of the engine as a host sees it.

mod common;

use classweave::{
    bytecode::opcodes,
    classfile::ClassFile,
    mixin::{
        ClassTransformer, DiagnosticKind, EngineConfig, HandlerRef, InsertionPoint, LocationKind,
        MatchContract, MethodSelector, MixinEngine, Phases, Rule, RuleBundle,
    },
};
use common::*;

#[test]
fn test_unregistered_units_are_never_intercepted() {
    let engine = MixinEngine::new();
    engine.register(RuleBundle::new("A", PLAYER).with_rule(inject_head("first")));

    for _ in 0..3 {
        assert!(engine.decide("com.example.Enemy").is_empty());
        assert!(engine.decide("").is_empty());
    }
    assert_eq!(engine.decide("com.example.Player"), Phases::BEFORE);
}

#[test]
fn test_excluded_namespaces_ignore_the_registry() {
    let engine = MixinEngine::with_config(EngineConfig::new().exclude("com.example.internal"));
    for target in ["java/lang/String", "classweave/Hooks", "com/example/internal/Secret"] {
        engine.register(RuleBundle::new("A", target).with_rule(inject_head("first")));
    }

    assert!(engine.decide("java.lang.String").is_empty());
    assert!(engine.decide("classweave.Hooks").is_empty());
    assert!(engine.decide("com.example.internal.Secret").is_empty());
    assert!(engine
        .transform_unit("java/lang/String", &player_class())
        .is_none());
}

#[test]
fn test_bundles_apply_in_priority_order() {
    let engine = MixinEngine::new();
    engine.register(
        RuleBundle::new("Low", PLAYER)
            .with_priority(1000)
            .with_rule(inject_head("second")),
    );
    engine.register(
        RuleBundle::new("High", PLAYER)
            .with_priority(2000)
            .with_rule(inject_head("first")),
    );

    let transformed = engine.transform_unit(PLAYER, &player_class()).unwrap();
    assert_eq!(transformed.applied, ["High", "Low"]);
    assert_eq!(
        static_calls(&transformed.bytes, "damage", "(I)V"),
        [format!("{HOOKS}.first"), format!("{HOOKS}.second")]
    );
}

#[test]
fn test_untouched_members_stay_byte_identical() {
    let input = player_class();
    let engine = MixinEngine::new();
    engine.register(RuleBundle::new("A", PLAYER).with_rule(inject_head("first")));

    let output = engine.transform_unit(PLAYER, &input).unwrap().bytes;
    assert_ne!(output, input);

    let before = member_bytes(&input);
    let after = member_bytes(&output);
    assert_eq!(before.len(), after.len());
    for (key, bytes) in &before {
        if key == "method damage(I)V" {
            assert_ne!(&after[key], bytes);
        } else {
            assert_eq!(&after[key], bytes, "{key} changed");
        }
    }

    let original = ClassFile::parse(&input).unwrap();
    let edited = ClassFile::parse(&output).unwrap();
    assert_eq!(edited.major_version, original.major_version);
    assert_eq!(edited.access_flags, original.access_flags);
    assert_eq!(edited.this_class, original.this_class);
    assert_eq!(edited.super_class, original.super_class);
    assert_eq!(edited.interfaces, original.interfaces);
    assert_eq!(edited.attributes(), original.attributes());
    assert_eq!(
        opcodes_of(&output, "damage", "(I)V")[..3],
        [opcodes::ALOAD_0, opcodes::ILOAD_1, opcodes::INVOKESTATIC]
    );
}

#[test]
fn test_failed_bundle_does_not_block_independent_bundle() {
    let engine = MixinEngine::new();
    engine.register(
        RuleBundle::new("Broken", PLAYER)
            .with_priority(2000)
            .with_rule(Rule::Inject {
                method: MethodSelector::exact("damage", "(I)V"),
                handler: HandlerRef::new(HOOKS, "never"),
                at: InsertionPoint::new(LocationKind::Invoke).with_target("missing()V"),
                cancellable: false,
                remap: false,
                contract: MatchContract::require(1),
            }),
    );
    engine.register(RuleBundle::new("Working", PLAYER).with_rule(inject_head("first")));

    let transformed = engine.transform_unit(PLAYER, &player_class()).unwrap();
    assert_eq!(transformed.applied, ["Working"]);
    assert_eq!(transformed.failed, ["Broken"]);
    assert_eq!(
        static_calls(&transformed.bytes, "damage", "(I)V"),
        [format!("{HOOKS}.first")]
    );

    let reported: Vec<_> = engine.diagnostics().for_unit(PLAYER).collect();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].kind, DiagnosticKind::Configuration);
    assert_eq!(reported[0].bundle.as_deref(), Some("Broken"));
}

#[test]
fn test_clear_empties_every_decision() {
    let engine = MixinEngine::new();
    for target in [PLAYER, HOOKS] {
        engine.register(RuleBundle::new("A", target).with_rule(inject_head("first")));
    }
    assert_eq!(engine.decide(PLAYER), Phases::BEFORE);
    assert_eq!(engine.gate().cached(engine.registry()), Some(true));

    engine.clear();
    assert!(engine.decide(PLAYER).is_empty());
    assert!(engine.decide(HOOKS).is_empty());
    assert_eq!(engine.gate().cached(engine.registry()), Some(false));
    assert_eq!(engine.count(), 0);
}

#[test]
fn test_round_trip_without_applicable_bundles() {
    let input = player_class();
    let engine = MixinEngine::new();
    engine.register(RuleBundle::new("Off", PLAYER).with_enabled(false).with_rule(inject_head("x")));
    engine.register(RuleBundle::new("Empty", PLAYER));

    assert!(engine.transform_unit(PLAYER, &input).is_none());

    let mut bytes = input.clone();
    assert!(!engine.transform(Phases::BEFORE, &mut bytes, PLAYER));
    assert_eq!(bytes, input);
}

#[test]
fn test_host_callback_rewrites_in_place() {
    let engine = MixinEngine::with_config(EngineConfig {
        audit: true,
        ..EngineConfig::default()
    });
    engine.register(RuleBundle::new("A", PLAYER).with_rule(inject_head("first")));

    let input = player_class();
    let mut bytes = input.clone();
    assert!(!engine.transform(Phases::AFTER, &mut bytes, PLAYER));
    assert_eq!(bytes, input);

    assert!(engine.transform(Phases::BEFORE, &mut bytes, "com.example.Player"));
    assert_ne!(bytes, input);
    assert!(ClassFile::parse(&bytes).is_ok());
    assert_eq!(engine.audit().len(), 1);
}

#[test]
fn test_corrupt_input_is_returned_unchanged() {
    let engine = MixinEngine::new();
    engine.register(RuleBundle::new("A", PLAYER).with_rule(inject_head("first")));

    let mut truncated = player_class();
    truncated.truncate(truncated.len() / 2);
    let snapshot = truncated.clone();

    assert!(!engine.transform(Phases::BEFORE, &mut truncated, PLAYER));
    assert_eq!(truncated, snapshot);
    assert_eq!(engine.diagnostics().count_of(DiagnosticKind::Internal), 1);
}
