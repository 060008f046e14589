//! The transformation pipeline: decode, apply bundles, re-encode.
//!
//! The pipeline works on one unit at a time and never touches shared state other than the
//! diagnostics sink. Bundles are applied in snapshot order; each one runs against a
//! checkpoint of the [`ClassEditor`] and is rolled back as a whole when any of its rules
//! fails, so a failed bundle leaves no trace in the output.
//!
//! The unit is re-encoded only when at least one edit survived. Untouched parts of the
//! class are written from the input's byte spans.

use log::{debug, warn};

use crate::{
    classfile::ClassFile,
    mixin::{
        edits,
        editor::ClassEditor,
        registry::RegisteredBundle,
        resolve::RuleContext,
        Diagnostic, DiagnosticKind, Diagnostics, EngineConfig, RuleBundle,
    },
    Error, Result,
};

/// The result of a pipeline run that changed the unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// The re-encoded unit
    pub bytes: Vec<u8>,
    /// Bundles whose rules all applied
    pub applied: Vec<String>,
    /// Bundles that were rolled back
    pub failed: Vec<String>,
}

/// Applies rule bundles to single units.
pub struct Pipeline<'e> {
    config: &'e EngineConfig,
    diagnostics: &'e Diagnostics,
}

impl<'e> Pipeline<'e> {
    /// A pipeline reporting into `diagnostics`
    #[must_use]
    pub fn new(config: &'e EngineConfig, diagnostics: &'e Diagnostics) -> Self {
        Pipeline {
            config,
            diagnostics,
        }
    }

    /// Transform `input`, the class `unit` (internal name), with `bundles`.
    ///
    /// Returns `None` if no bundle is enabled or no edit survived; the caller keeps the
    /// input bytes in that case.
    ///
    /// # Errors
    ///
    /// Returns decoding and encoding errors of the unit itself. Errors of single bundles are
    /// recorded as diagnostics and do not fail the run.
    pub fn run(
        &self,
        bundles: &[RegisteredBundle],
        unit: &str,
        input: &[u8],
    ) -> Result<Option<Transformed>> {
        let mut enabled = bundles
            .iter()
            .map(|registered| registered.bundle.as_ref())
            .filter(|bundle| bundle.enabled)
            .peekable();
        if enabled.peek().is_none() {
            return Ok(None);
        }

        let class = ClassFile::parse(input)?;
        let name = class.this_name()?;
        if name != unit {
            return Err(Error::Configuration(format!(
                "Unit {unit} holds class {name}"
            )));
        }

        let mut editor = ClassEditor::new(&class);
        let mut applied = Vec::new();
        let mut failed = Vec::new();
        for bundle in enabled {
            let checkpoint = editor.checkpoint();
            match self.apply_bundle(&mut editor, bundle, unit) {
                Ok(()) => applied.push(bundle.name.clone()),
                Err((rule, error)) => {
                    self.report(unit, bundle, rule, &error);
                    editor.rollback(checkpoint);
                    failed.push(bundle.name.clone());
                }
            }
        }

        if !editor.is_modified() {
            debug!("{unit}: no edits survived");
            return Ok(None);
        }

        let bytes = editor.finish()?;
        if self.config.verify_output {
            ClassFile::parse(&bytes)?;
        }
        debug!(
            "{unit}: {} bytes -> {} bytes, applied [{}]",
            input.len(),
            bytes.len(),
            applied.join(", ")
        );
        Ok(Some(Transformed {
            bytes,
            applied,
            failed,
        }))
    }

    /// Apply every rule of `bundle`; on failure returns the failing rule's index (`None`
    /// when encoding the bundle's result failed).
    fn apply_bundle(
        &self,
        editor: &mut ClassEditor<'_, '_>,
        bundle: &RuleBundle,
        unit: &str,
    ) -> std::result::Result<(), (Option<usize>, Error)> {
        for (index, rule) in bundle.rules.iter().enumerate() {
            let ctx = RuleContext {
                unit,
                bundle: &bundle.name,
                rule: index,
                remap: rule.remap(),
                config: self.config,
                diagnostics: self.diagnostics,
            };
            edits::apply(&ctx, editor, rule).map_err(|error| (Some(index), error))?;
        }
        editor.encode_bodies().map_err(|error| (None, error))?;
        Ok(())
    }

    fn report(&self, unit: &str, bundle: &RuleBundle, rule: Option<usize>, error: &Error) {
        let kind = if error.is_configuration() {
            DiagnosticKind::Configuration
        } else {
            DiagnosticKind::Internal
        };
        let mut diagnostic =
            Diagnostic::new(kind, unit, error.to_string()).with_bundle(&bundle.name);
        if let Some(rule) = rule {
            let kind = bundle.rules.get(rule).map_or("rule", |rule| rule.kind());
            warn!("{unit}: bundle {} abandoned at {kind} #{rule}", bundle.name);
            diagnostic = diagnostic.with_rule(rule);
        } else {
            warn!("{unit}: bundle {} could not be encoded", bundle.name);
        }
        self.diagnostics.push(diagnostic);
    }
}
