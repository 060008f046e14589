//! Configuration for the transformation engine.

use std::sync::Arc;

use crate::mixin::Mappings;

/// Namespace of the engine's own classes; never transformed.
pub const OWN_NAMESPACE: &str = "classweave/";

/// Configuration for the transformation engine.
///
/// Controls which units the gate ignores, how name-only method matches are treated and
/// what the pipeline records about the units it transforms.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Internal-name prefix of the engine's own classes (default: `classweave/`).
    pub own_namespace: String,

    /// Additional internal-name prefixes the gate skips, on top of the platform namespaces.
    pub excluded_namespaces: Vec<String>,

    /// Treat a name-only method match with several overloads as a configuration error
    /// instead of picking the first declared one (default: false).
    pub strict_ambiguity: bool,

    /// Name mappings used by rules with `remap` set.
    pub mappings: Option<Arc<Mappings>>,

    /// Record an audit entry for every transformed unit (default: false).
    pub audit: bool,

    /// Re-parse every transformed unit before handing it back (default: true).
    pub verify_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            own_namespace: OWN_NAMESPACE.to_string(),
            excluded_namespaces: Vec::new(),
            strict_ambiguity: false,
            mappings: None,
            audit: false,
            verify_output: true,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that fails bundles on ambiguous method matches and audits
    /// every transformed unit.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_ambiguity: true,
            audit: true,
            ..Self::default()
        }
    }

    /// Creates a configuration that resolves ambiguity by declaration order and skips the
    /// output re-parse.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            strict_ambiguity: false,
            verify_output: false,
            ..Self::default()
        }
    }

    /// Adds an excluded package namespace (dotted or internal form, trailing separator
    /// optional).
    #[must_use]
    pub fn exclude(mut self, namespace: &str) -> Self {
        self.excluded_namespaces
            .push(crate::utils::namespace_prefix(namespace));
        self
    }

    /// Sets the mappings used by remapping rules.
    #[must_use]
    pub fn with_mappings(mut self, mappings: Mappings) -> Self {
        self.mappings = Some(Arc::new(mappings));
        self
    }
}
