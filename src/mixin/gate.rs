//! The interception gate: the per-unit fast path in front of the pipeline.
//!
//! The gate runs for every unit the host loads, so it must be cheap and must never fail.
//! It checks, in order:
//!
//! 1. The excluded namespaces (platform packages and the engine itself). Fixed, not
//!    registry-driven, and checked first so the engine never transforms its own classes.
//! 2. A memoized "registry holds an enabled bundle" flag. The flag is computed once per
//!    registry epoch; a panic while computing it counts as "empty".
//! 3. Whether this unit has an enabled bundle.
//!
//! The memoized flag is only recomputed after [`crate::mixin::TransformationRegistry::clear`]
//! or [`InterceptionGate::invalidate`]. Bundles registered after the first decision of an
//! epoch are not observed while the flag is `false`.

use std::panic::{catch_unwind, AssertUnwindSafe};

use bitflags::bitflags;
use log::{debug, error};

use crate::{
    mixin::{EngineConfig, TransformationRegistry},
    utils::{internal_name, namespace_prefix, synchronization::ComputeOnce},
};

bitflags! {
    /// Loading stages at which a unit asks for the transform callback.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Phases: u8 {
        /// Before the unit is defined
        const BEFORE = 0b01;
        /// After the unit is defined
        const AFTER = 0b10;
    }
}

/// Platform namespaces that are never transformed.
pub const PLATFORM_NAMESPACES: &[&str] = &[
    "java/",
    "javax/",
    "jdk/",
    "jdk/internal/",
    "sun/",
    "com/sun/",
];

/// Per-unit interception predicate.
#[derive(Debug)]
pub struct InterceptionGate {
    excluded: Vec<String>,
    active: ComputeOnce,
}

impl InterceptionGate {
    /// Build a gate excluding the platform namespaces plus the configured ones
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let mut excluded: Vec<String> = PLATFORM_NAMESPACES
            .iter()
            .map(|namespace| (*namespace).to_string())
            .collect();
        excluded.push(namespace_prefix(&config.own_namespace));
        excluded.extend(config.excluded_namespaces.iter().map(|n| namespace_prefix(n)));
        excluded.retain(|namespace| !namespace.is_empty());

        InterceptionGate {
            excluded,
            active: ComputeOnce::new(),
        }
    }

    /// Returns `true` if `unit` (internal form) lies in an excluded namespace
    #[must_use]
    pub fn is_excluded(&self, unit: &str) -> bool {
        self.excluded
            .iter()
            .any(|namespace| unit.starts_with(namespace.as_str()))
    }

    /// The memoized "registry holds an enabled bundle" flag, computing it if needed
    pub fn is_active(&self, registry: &TransformationRegistry) -> bool {
        self.active.get_or_compute(registry.epoch(), || {
            match catch_unwind(AssertUnwindSafe(|| registry.has_enabled())) {
                Ok(active) => {
                    debug!("Interception gate computed: active={active}");
                    active
                }
                Err(_) => {
                    error!("Registry check panicked, interception disabled");
                    false
                }
            }
        })
    }

    /// The cached flag for the registry's current epoch, if computed
    #[must_use]
    pub fn cached(&self, registry: &TransformationRegistry) -> Option<bool> {
        self.active.get(registry.epoch())
    }

    /// Decide which stages `unit` (dotted or internal) needs the transform callback for
    pub fn decide(&self, registry: &TransformationRegistry, unit: &str) -> Phases {
        let unit = internal_name(unit);
        if unit.is_empty() || self.is_excluded(&unit) {
            return Phases::empty();
        }
        if !self.is_active(registry) {
            return Phases::empty();
        }
        if registry.has_enabled_for(&unit) {
            debug!("Intercepting {unit}");
            Phases::BEFORE
        } else {
            Phases::empty()
        }
    }

    /// Forget the memoized flag
    pub fn invalidate(&self) {
        self.active.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixin::RuleBundle;

    fn gate() -> InterceptionGate {
        InterceptionGate::new(&EngineConfig::default().exclude("org.vendor."))
    }

    #[test]
    fn test_excluded_namespaces() {
        let gate = gate();
        for unit in [
            "java/lang/String",
            "javax/swing/JFrame",
            "jdk/internal/misc/Unsafe",
            "sun/misc/Unsafe",
            "com/sun/proxy/$Proxy1",
            "classweave/mixin/Engine",
            "org/vendor/Lib",
        ] {
            assert!(gate.is_excluded(unit), "{unit}");
        }
        assert!(!gate.is_excluded("com/example/Player"));
        assert!(!gate.is_excluded("javafx/Thing"));
    }

    #[test]
    fn test_excluded_namespace_is_a_package_boundary() {
        let mut config = EngineConfig::default().exclude("com.example.internal");
        config.excluded_namespaces.push("com/example/legacy".to_string());
        let gate = InterceptionGate::new(&config);
        assert!(gate.is_excluded("com/example/internal/Secret"));
        assert!(!gate.is_excluded("com/example/internalTools/Foo"));
        assert!(gate.is_excluded("com/example/legacy/Old"));
        assert!(!gate.is_excluded("com/example/legacyBridge/New"));
    }

    #[test]
    fn test_excluded_ignores_registry() {
        let gate = gate();
        let registry = TransformationRegistry::new();
        registry.register(RuleBundle::new("M", "java/lang/String"));
        assert_eq!(gate.decide(&registry, "java.lang.String"), Phases::empty());
    }

    #[test]
    fn test_empty_registry_skips_and_memoizes() {
        let gate = gate();
        let registry = TransformationRegistry::new();
        assert_eq!(gate.decide(&registry, "com/example/Player"), Phases::empty());
        assert_eq!(gate.cached(&registry), Some(false));

        // Memoized for the epoch: later registrations are not observed
        registry.register(RuleBundle::new("M", "com/example/Player"));
        assert_eq!(gate.decide(&registry, "com/example/Player"), Phases::empty());

        gate.invalidate();
        assert_eq!(gate.decide(&registry, "com/example/Player"), Phases::BEFORE);
    }

    #[test]
    fn test_only_targets_get_phases() {
        let gate = gate();
        let registry = TransformationRegistry::new();
        registry.register(RuleBundle::new("M", "com/example/Player"));
        registry.register(RuleBundle::new("Off", "com/example/Other").with_enabled(false));
        assert_eq!(gate.decide(&registry, "com.example.Player"), Phases::BEFORE);
        assert_eq!(gate.decide(&registry, "com/example/Other"), Phases::empty());
        assert_eq!(gate.decide(&registry, "com/example/Unknown"), Phases::empty());
        assert_eq!(gate.decide(&registry, "com/example/Unknown"), Phases::empty());
    }

    #[test]
    fn test_clear_recomputes() {
        let gate = gate();
        let registry = TransformationRegistry::new();
        registry.register(RuleBundle::new("M", "com/example/Player"));
        assert_eq!(gate.decide(&registry, "com/example/Player"), Phases::BEFORE);
        assert_eq!(gate.cached(&registry), Some(true));

        registry.clear();
        assert_eq!(gate.cached(&registry), None);
        assert_eq!(gate.decide(&registry, "com/example/Player"), Phases::empty());
        assert_eq!(gate.cached(&registry), Some(false));
    }
}
