//! The load-time transformation engine.
//!
//! This module holds everything between "the host is about to load a unit" and "here are
//! the rewritten bytes": the rule model, the registry those rules live in, the gate that
//! keeps the common path cheap, and the pipeline that decodes, edits and re-encodes units.
//!
//! # Architecture
//!
//! ```text
//!  host load path
//!       │
//!       ▼
//!  InterceptionGate ──(excluded / nothing registered)──▶ load as is
//!       │ BEFORE
//!       ▼
//!  Pipeline ── lookup ──▶ TransformationRegistry
//!       │
//!       ├─ per bundle: checkpoint ─▶ resolve ─▶ edit ─▶ (rollback on failure)
//!       ▼
//!  ClassEditor::finish ─▶ ClassWriter (untouched spans copied verbatim)
//! ```
//!
//! # Key Components
//!
//! - [`MixinEngine`] - Process-scoped state and the [`ClassTransformer`] host contract
//! - [`TransformationRegistry`] - Lock-free reads of priority-ordered bundle snapshots
//! - [`InterceptionGate`] - Excluded namespaces and the memoized "anything registered" flag
//! - [`Pipeline`] - Applies bundles to one unit with per-bundle rollback
//! - [`RuleBundle`] / [`Rule`] - The data-only rule model
//! - [`Diagnostics`] / [`AuditLog`] - What went wrong, and what changed
//!
//! # Examples
//!
//! ```rust
//! use classweave::mixin::{
//!     ClassTransformer, HandlerRef, InsertionPoint, LocationKind, MatchContract,
//!     MethodSelector, MixinEngine, Phases, Rule, RuleBundle,
//! };
//!
//! let engine = MixinEngine::new();
//! let bundle = RuleBundle::new("PlayerMixin", "com/example/Player")
//!     .with_priority(1200)
//!     .with_rule(Rule::Inject {
//!         method: MethodSelector::exact("damage", "(I)V"),
//!         handler: HandlerRef::new("com/example/Hooks", "onDamage"),
//!         at: InsertionPoint::new(LocationKind::Return),
//!         cancellable: false,
//!         remap: false,
//!         contract: MatchContract::require(1),
//!     });
//! engine.register(bundle);
//!
//! assert_eq!(engine.count(), 1);
//! assert_eq!(engine.decide("com/example/Player"), Phases::BEFORE);
//! ```

mod audit;
mod config;
mod diagnostics;
pub mod editor;
pub mod edits;
mod engine;
mod gate;
mod mappings;
pub mod pipeline;
pub mod registry;
pub mod resolve;
mod rules;

pub use audit::{sha1_hex, AuditLog, AuditRecord};
pub use config::{EngineConfig, OWN_NAMESPACE};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use engine::{ClassTransformer, MixinEngine};
pub use gate::{InterceptionGate, Phases, PLATFORM_NAMESPACES};
pub use mappings::Mappings;
pub use pipeline::{Pipeline, Transformed};
pub use registry::{BundleSnapshot, RegisteredBundle, TransformationRegistry};
pub use rules::{
    parse_literal, AccessorKind, CallSiteMatch, ConstantMatcher, HandlerRef, InsertionPoint,
    LocationKind, MatchContract, MethodSelector, RelativeTo, Rule, RuleBundle, VariableSelector,
    DEFAULT_PRIORITY,
};
