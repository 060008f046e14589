//! The process-scoped engine and the host callback contract.
//!
//! [`MixinEngine`] owns everything the interception path needs: configuration, registry,
//! gate, diagnostics and audit log. Hosts talk to it through [`ClassTransformer`]; neither
//! callback can fail or panic through to the host.
//!
//! # Examples
//!
//! ```rust
//! use classweave::mixin::{
//!     ClassTransformer, HandlerRef, InsertionPoint, MatchContract, MethodSelector,
//!     MixinEngine, Phases, Rule, RuleBundle,
//! };
//!
//! let engine = MixinEngine::new();
//! engine.register(RuleBundle::new("PlayerMixin", "com.example.Player").with_rule(
//!     Rule::Inject {
//!         method: MethodSelector::named("tick"),
//!         handler: HandlerRef::new("com.example.Hooks", "onTick"),
//!         at: InsertionPoint::head(),
//!         cancellable: false,
//!         remap: false,
//!         contract: MatchContract::default(),
//!     },
//! ));
//!
//! assert_eq!(engine.decide("com.example.Player"), Phases::BEFORE);
//! assert!(engine.decide("java.lang.String").is_empty());
//! ```

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::OnceLock,
};

use log::error;

use crate::{
    mixin::{
        pipeline::{Pipeline, Transformed},
        registry::BundleSnapshot,
        AuditLog, AuditRecord, Diagnostic, DiagnosticKind, Diagnostics, EngineConfig,
        InterceptionGate, Phases, RuleBundle, TransformationRegistry,
    },
    utils::internal_name,
};

/// The callbacks a host's loading machinery invokes for every unit.
pub trait ClassTransformer: Send + Sync {
    /// Stages at which `unit` needs [`ClassTransformer::transform`]; empty to load as is
    fn decide(&self, unit: &str) -> Phases;

    /// Transform `bytes` of `unit` in place at `phase`, returning `true` if they changed
    fn transform(&self, phase: Phases, bytes: &mut Vec<u8>, unit: &str) -> bool;
}

/// Registry, gate, pipeline configuration and reporting in one place.
#[derive(Debug)]
pub struct MixinEngine {
    config: EngineConfig,
    registry: TransformationRegistry,
    gate: InterceptionGate,
    diagnostics: Diagnostics,
    audit: AuditLog,
}

impl Default for MixinEngine {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl MixinEngine {
    /// An engine with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with `config`
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        MixinEngine {
            gate: InterceptionGate::new(&config),
            config,
            registry: TransformationRegistry::new(),
            diagnostics: Diagnostics::new(),
            audit: AuditLog::new(),
        }
    }

    /// The process-wide engine, created with the default configuration on first use
    pub fn global() -> &'static MixinEngine {
        static GLOBAL: OnceLock<MixinEngine> = OnceLock::new();
        GLOBAL.get_or_init(MixinEngine::new)
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The registry
    #[must_use]
    pub fn registry(&self) -> &TransformationRegistry {
        &self.registry
    }

    /// The gate
    #[must_use]
    pub fn gate(&self) -> &InterceptionGate {
        &self.gate
    }

    /// Diagnostics recorded so far
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Audit records (only filled when [`EngineConfig::audit`] is set)
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Register `bundle`, returning its registration sequence number
    pub fn register(&self, bundle: RuleBundle) -> u64 {
        self.registry.register(bundle)
    }

    /// Bundles registered for `target`, in application order
    #[must_use]
    pub fn lookup(&self, target: &str) -> BundleSnapshot {
        self.registry.lookup(target)
    }

    /// Total number of registered rules
    #[must_use]
    pub fn count(&self) -> usize {
        self.registry.count()
    }

    /// Remove every bundle; the gate recomputes its flag on the next decision
    pub fn clear(&self) {
        self.registry.clear();
        self.gate.invalidate();
    }

    /// [`MixinEngine::clear`] plus dropping diagnostics and audit records
    pub fn reset(&self) {
        self.clear();
        self.diagnostics.clear();
        self.audit.clear();
    }

    /// Run the pipeline for `unit` over `input`; `None` when the unit stays as it is.
    ///
    /// Errors and panics are recorded as diagnostics.
    pub fn transform_unit(&self, unit: &str, input: &[u8]) -> Option<Transformed> {
        let unit = internal_name(unit);
        if self.gate.is_excluded(&unit) {
            return None;
        }
        let bundles = self.registry.lookup(&unit);
        if bundles.is_empty() {
            return None;
        }

        let pipeline = Pipeline::new(&self.config, &self.diagnostics);
        let outcome = catch_unwind(AssertUnwindSafe(|| pipeline.run(&bundles, &unit, input)));
        let failure = match outcome {
            Ok(Ok(transformed)) => return transformed.inspect(|t| self.record(&unit, input, t)),
            Ok(Err(err)) => {
                let kind = if err.is_configuration() {
                    DiagnosticKind::Configuration
                } else {
                    DiagnosticKind::Internal
                };
                Diagnostic::new(kind, &unit, err.to_string())
            }
            Err(panic) => Diagnostic::new(
                DiagnosticKind::Internal,
                &unit,
                format!("Pipeline panicked: {}", panic_message(panic.as_ref())),
            ),
        };
        error!("{unit} left unchanged: {}", failure.message);
        self.diagnostics.push(failure);
        None
    }

    fn record(&self, unit: &str, input: &[u8], transformed: &Transformed) {
        if self.config.audit {
            self.audit.record(AuditRecord::new(
                unit,
                input,
                transformed.bytes.clone(),
                transformed.applied.clone(),
                transformed.failed.clone(),
            ));
        }
    }
}

impl ClassTransformer for MixinEngine {
    fn decide(&self, unit: &str) -> Phases {
        self.gate.decide(&self.registry, unit)
    }

    fn transform(&self, phase: Phases, bytes: &mut Vec<u8>, unit: &str) -> bool {
        if !phase.contains(Phases::BEFORE) {
            return false;
        }
        match self.transform_unit(unit, bytes) {
            Some(transformed) => {
                *bytes = transformed.bytes;
                true
            }
            None => false,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::opcodes,
        classfile::{ClassFile, PoolAccess},
        mixin::{
            edits::tests::{body_in, opcodes_of},
            HandlerRef, InsertionPoint, MatchContract, MethodSelector, Rule,
        },
        test::{sample_class, HOOKS, PLAYER},
    };

    fn head(handler: &str) -> Rule {
        Rule::Inject {
            method: MethodSelector::exact("tick", "()V"),
            handler: HandlerRef::new(HOOKS, handler),
            at: InsertionPoint::head(),
            cancellable: false,
            remap: false,
            contract: MatchContract::default(),
        }
    }

    #[test]
    fn test_decide_for_unregistered_and_excluded() {
        let engine = MixinEngine::new();
        engine.register(RuleBundle::new("Hooks", PLAYER).with_rule(head("a")));
        for _ in 0..3 {
            assert!(engine.decide("com/example/Unrelated").is_empty());
        }
        assert!(engine.decide("java/lang/Object").is_empty());
        assert!(engine.decide("classweave/mixin/MixinEngine").is_empty());
        assert_eq!(engine.decide("com.example.Player"), Phases::BEFORE);
    }

    #[test]
    fn test_priority_order_of_application() {
        let engine = MixinEngine::new();
        engine.register(RuleBundle::new("Low", PLAYER).with_rule(head("low")));
        engine.register(
            RuleBundle::new("High", PLAYER)
                .with_priority(2000)
                .with_rule(head("high")),
        );

        let mut bytes = sample_class();
        assert!(engine.transform(Phases::BEFORE, &mut bytes, PLAYER));

        let class = ClassFile::parse(&bytes).unwrap();
        let body = body_in(&bytes, "tick", "()V");
        let handlers: Vec<&str> = body
            .insns
            .iter()
            .filter_map(|node| node.insn())
            .filter(|insn| insn.opcode == opcodes::INVOKESTATIC)
            .filter_map(|insn| class.constant_pool().member_ref(insn.pool_index()?).ok())
            .filter(|member| member.owner == HOOKS)
            .map(|member| member.name)
            .collect();
        assert_eq!(handlers, ["high", "low"]);
    }

    #[test]
    fn test_transform_without_edits_keeps_bytes() {
        let engine = MixinEngine::new();
        let mut bytes = sample_class();
        let original = bytes.clone();
        assert!(!engine.transform(Phases::BEFORE, &mut bytes, PLAYER));

        engine.register(
            RuleBundle::new("Missing", PLAYER).with_rule(Rule::Overwrite {
                method: MethodSelector::named("fly"),
                handler: HandlerRef::new(HOOKS, "fly"),
                remap: false,
            }),
        );
        assert!(!engine.transform(Phases::BEFORE, &mut bytes, PLAYER));
        assert!(!engine.transform(Phases::AFTER, &mut bytes, PLAYER));
        assert_eq!(bytes, original);
        assert_eq!(engine.diagnostics().count(), 1);
    }

    #[test]
    fn test_corrupt_unit_is_left_alone() {
        let engine = MixinEngine::new();
        engine.register(RuleBundle::new("Hooks", PLAYER).with_rule(head("a")));
        let mut bytes = sample_class();
        bytes.truncate(bytes.len() / 2);
        let original = bytes.clone();
        assert!(!engine.transform(Phases::BEFORE, &mut bytes, PLAYER));
        assert_eq!(bytes, original);
        assert_eq!(engine.diagnostics().count_of(DiagnosticKind::Internal), 1);
    }

    #[test]
    fn test_clear_and_reset() {
        let engine = MixinEngine::with_config(EngineConfig::strict());
        engine.register(RuleBundle::new("Hooks", PLAYER).with_rule(head("a")));
        let mut bytes = sample_class();
        assert!(engine.transform(Phases::BEFORE, &mut bytes, PLAYER));
        assert_eq!(engine.audit().len(), 1);
        assert_eq!(engine.count(), 1);

        engine.clear();
        assert!(engine.decide(PLAYER).is_empty());
        assert_eq!(engine.gate().cached(engine.registry()), Some(false));
        assert_eq!(engine.audit().len(), 1);

        engine.reset();
        assert!(engine.audit().is_empty());
        assert_eq!(engine.count(), 0);
        assert_eq!(opcodes_of(&bytes, "tick", "()V")[1], opcodes::INVOKESTATIC);
    }
}
