//! The contract a loaded unit fulfils to contribute rules.

use crate::mixin::{Rule, RuleBundle, DEFAULT_PRIORITY};

/// A mixin declaration: metadata plus the rules it contributes to one target unit.
///
/// Declarations carry no edits of their own. The loader default-constructs each compiled
/// unit, and those that produce a declaration with [`MixinDeclaration::enabled`] set are
/// turned into a [`RuleBundle`] and registered under [`MixinDeclaration::target_unit`].
///
/// # Examples
///
/// ```rust
/// use classweave::loader::MixinDeclaration;
/// use classweave::mixin::{HandlerRef, MethodSelector, Rule};
///
/// struct TickCounter;
///
/// impl MixinDeclaration for TickCounter {
///     fn name(&self) -> &str {
///         "TickCounter"
///     }
///
///     fn target_unit(&self) -> &str {
///         "com.example.World"
///     }
///
///     fn rules(&self) -> Vec<Rule> {
///         vec![Rule::Overwrite {
///             method: MethodSelector::named("tickRate"),
///             handler: HandlerRef::new("com.example.Hooks", "tickRate"),
///             remap: false,
///         }]
///     }
/// }
///
/// let bundle = TickCounter.to_bundle();
/// assert_eq!(bundle.target_unit, "com/example/World");
/// assert_eq!(bundle.priority, 1000);
/// assert!(bundle.enabled);
/// ```
pub trait MixinDeclaration: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// The unit the rules apply to, dotted or internal
    fn target_unit(&self) -> &str;

    /// Higher priorities apply first
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Disabled declarations are counted but not registered
    fn enabled(&self) -> bool {
        true
    }

    /// Rules in application order
    fn rules(&self) -> Vec<Rule>;

    /// The declaration as a registrable bundle
    fn to_bundle(&self) -> RuleBundle {
        let mut bundle = RuleBundle::new(self.name(), self.target_unit())
            .with_priority(self.priority())
            .with_enabled(self.enabled());
        bundle.rules = self.rules();
        bundle
    }
}

/// A declaration backed by an already built bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleDeclaration(pub RuleBundle);

impl MixinDeclaration for BundleDeclaration {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn target_unit(&self) -> &str {
        &self.0.target_unit
    }

    fn priority(&self) -> i32 {
        self.0.priority
    }

    fn enabled(&self) -> bool {
        self.0.enabled
    }

    fn rules(&self) -> Vec<Rule> {
        self.0.rules.clone()
    }

    fn to_bundle(&self) -> RuleBundle {
        self.0.clone()
    }
}
