#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use classweave::{
    classfile::ClassFile,
    mixin::{
        HandlerRef, InsertionPoint, LocationKind, MatchContract, MethodSelector, MixinEngine,
        Rule, RuleBundle,
    },
};

/// One engine for the whole run; each input resets it and registers a bundle for its own class
fn engine() -> &'static MixinEngine {
    static ENGINE: OnceLock<MixinEngine> = OnceLock::new();
    ENGINE.get_or_init(MixinEngine::new)
}

fuzz_target!(|data: &[u8]| {
    let Ok(class) = ClassFile::parse(data) else {
        return;
    };
    let Ok(name) = class.this_name() else {
        return;
    };
    let Some(first) = class.methods().first() else {
        return;
    };
    let Ok(method) = class.member_name(first) else {
        return;
    };

    let engine = engine();
    engine.reset();
    engine.register(
        RuleBundle::new("Fuzz", name)
            .with_rule(Rule::Inject {
                method: MethodSelector::named(method),
                handler: HandlerRef::new("fuzz/Hooks", "hook"),
                at: InsertionPoint::new(LocationKind::Return),
                cancellable: false,
                remap: false,
                contract: MatchContract::default(),
            })
            .with_rule(Rule::ModifyConstant {
                method: MethodSelector::named(method),
                handler: HandlerRef::new("fuzz/Hooks", "constant"),
                constants: Vec::new(),
                remap: false,
                contract: MatchContract::default(),
            }),
    );

    if let Some(transformed) = engine.transform_unit(name, data) {
        assert!(ClassFile::parse(&transformed.bytes).is_ok());
    }
});
