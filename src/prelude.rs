//! # classweave Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the classweave library. Import this module to get quick access to the essential
//! types for registering rules and transforming units.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classweave operations
pub use crate::Error;

/// The result type used throughout classweave
pub use crate::Result;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The engine and the host callback contract
pub use crate::mixin::{ClassTransformer, MixinEngine, Phases, Transformed};

/// Engine configuration and name mappings
pub use crate::mixin::{EngineConfig, Mappings};

/// Loading declarations from a directory
pub use crate::loader::{LoadReport, MixinDeclaration, MixinLoader};

// ================================================================================================
// Rule Model
// ================================================================================================

/// Bundles and rules
pub use crate::mixin::{Rule, RuleBundle, DEFAULT_PRIORITY};

/// Method, handler and call site patterns
pub use crate::mixin::{CallSiteMatch, HandlerRef, MethodSelector};

/// Insertion points
pub use crate::mixin::{InsertionPoint, LocationKind, RelativeTo};

/// Rule parameters
pub use crate::mixin::{AccessorKind, ConstantMatcher, MatchContract, VariableSelector};

// ================================================================================================
// Reporting
// ================================================================================================

/// Diagnostics and audit records
pub use crate::mixin::{AuditRecord, Diagnostic, DiagnosticKind};

// ================================================================================================
// Class Files
// ================================================================================================

/// Parsed units and their building blocks
pub use crate::classfile::{
    ClassFile, ClassFileBuilder, ConstantValue, FieldType, MethodBody, MethodDescriptor,
};
