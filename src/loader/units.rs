//! Binary units produced at load time, resolvable by name.

use std::{path::PathBuf, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{utils::internal_name, Error, Result};

/// A unit defined in a [`UnitLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedUnit {
    /// Internal name
    pub name: String,
    /// The unit's bytes as produced by its compiler
    pub bytes: Arc<[u8]>,
    /// Source file the unit was compiled from, if any
    pub source: Option<PathBuf>,
}

/// Name-keyed table of defined units.
///
/// Names are stored in internal form, so `com.example.Hooks` and `com/example/Hooks` refer to
/// the same unit. A name can be defined once.
#[derive(Debug, Default)]
pub struct UnitLoader {
    units: DashMap<String, Arc<DefinedUnit>>,
}

impl UnitLoader {
    /// Creates an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a unit of the same name is already defined.
    pub fn define(
        &self,
        name: &str,
        bytes: impl Into<Arc<[u8]>>,
        source: Option<PathBuf>,
    ) -> Result<Arc<DefinedUnit>> {
        let name = internal_name(name);
        match self.units.entry(name.clone()) {
            Entry::Occupied(existing) => Err(Error::Configuration(format!(
                "Unit {name} is already defined{}",
                existing
                    .get()
                    .source
                    .as_ref()
                    .map(|path| format!(" by {}", path.display()))
                    .unwrap_or_default()
            ))),
            Entry::Vacant(slot) => {
                let unit = Arc::new(DefinedUnit {
                    name,
                    bytes: bytes.into(),
                    source,
                });
                slot.insert(Arc::clone(&unit));
                Ok(unit)
            }
        }
    }

    /// The unit named `name`
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<DefinedUnit>> {
        self.units
            .get(&internal_name(name))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if `name` is defined
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(&internal_name(name))
    }

    /// Number of defined units
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if nothing is defined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Names of all defined units, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
