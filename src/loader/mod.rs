//! Loading mixin declarations and handler units from a directory.
//!
//! [`MixinLoader`] walks a root directory, hands every file some [`SourceCompiler`] accepts
//! to that compiler, defines the resulting units in a [`UnitLoader`], default-constructs the
//! ones that carry a constructor and registers every enabled [`MixinDeclaration`] with a
//! [`crate::mixin::MixinEngine`].
//!
//! A file that fails to compile, define, construct or register is recorded in the
//! [`LoadReport`] and the pass continues with the next file.
//!
//! # Ordering
//!
//! Compilation may run in parallel, but definition and registration always happen in sorted
//! path order, so the registration sequence of bundles with equal priority does not depend
//! on scheduling or on directory iteration order.
//!
//! # Examples
//!
//! ```rust,no_run
//! use classweave::loader::MixinLoader;
//! use classweave::mixin::MixinEngine;
//!
//! let engine = MixinEngine::new();
//! let report = MixinLoader::new()
//!     .root("mixins")
//!     .parallel(true)
//!     .load(&engine)?;
//!
//! println!("{} bundles registered, {} failures", report.registered, report.failure_count());
//! # Ok::<(), classweave::Error>(())
//! ```

mod compiler;
mod declaration;
mod factory;
mod units;
mod xml;

pub use compiler::{ClassPassthrough, CompiledUnit, SourceCompiler};
pub use declaration::{BundleDeclaration, MixinDeclaration};
pub use factory::{
    ArgKind, Argument, Constructor, ConstructorSignature, FactoryTable, UnitInstance,
};
pub use units::{DefinedUnit, UnitLoader};
pub use xml::{parse_declaration, XmlMixinCompiler, XML_SUFFIX};

use std::{
    fmt, fs,
    panic::{catch_unwind, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{mixin::MixinEngine, Error, Result};

/// Counters and failures of one load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Files claimed by a compiler
    pub found: usize,
    /// Files compiled successfully
    pub compiled: usize,
    /// Bundles registered with the engine
    pub registered: usize,
    /// Declarations skipped because they are disabled
    pub disabled: usize,
    /// Failed files with the reason
    pub failures: Vec<(PathBuf, String)>,
}

impl LoadReport {
    /// Returns `true` if no file failed
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns `true` if at least one file failed
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Number of failed files
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    fn record_failure(&mut self, path: &Path, error: &Error) {
        warn!("Failed to load {}: {error}", path.display());
        self.failures.push((path.to_path_buf(), error.to_string()));
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} found, {} compiled, {} registered, {} disabled, {} failed",
            self.found,
            self.compiled,
            self.registered,
            self.disabled,
            self.failures.len()
        )
    }
}

/// Builder for a load pass over a directory of declarations and handler units.
///
/// The default compilers are [`XmlMixinCompiler`] and [`ClassPassthrough`]; further ones are
/// consulted in the order they are added, after the defaults unless
/// [`MixinLoader::without_default_compilers`] is used.
pub struct MixinLoader {
    /// Directory to scan; created when absent
    root: Option<PathBuf>,
    /// Front-ends, first match wins
    compilers: Vec<Box<dyn SourceCompiler>>,
    /// Whether to compile files on the rayon pool
    parallel: bool,
    /// Where compiled units are defined
    units: Arc<UnitLoader>,
    /// Constructors of compiled units
    factories: Arc<FactoryTable>,
}

impl Default for MixinLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MixinLoader {
    /// Create a new loader with the default compilers.
    #[must_use]
    pub fn new() -> Self {
        MixinLoader {
            root: None,
            compilers: vec![Box::new(XmlMixinCompiler), Box::new(ClassPassthrough)],
            parallel: false,
            units: Arc::new(UnitLoader::new()),
            factories: Arc::new(FactoryTable::new()),
        }
    }

    /// Set the directory to scan. It does not have to exist yet.
    #[must_use]
    pub fn root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Drop the built-in compilers.
    #[must_use]
    pub fn without_default_compilers(mut self) -> Self {
        self.compilers.clear();
        self
    }

    /// Add a compiler.
    #[must_use]
    pub fn with_compiler<C: SourceCompiler + 'static>(mut self, compiler: C) -> Self {
        self.compilers.push(Box::new(compiler));
        self
    }

    /// Compile files in parallel.
    #[must_use]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Share a unit loader, e.g. with a host that resolves handler classes from it.
    #[must_use]
    pub fn with_units(mut self, units: Arc<UnitLoader>) -> Self {
        self.units = units;
        self
    }

    /// Units defined so far
    #[must_use]
    pub fn units(&self) -> &Arc<UnitLoader> {
        &self.units
    }

    /// Constructors registered so far
    #[must_use]
    pub fn factories(&self) -> &Arc<FactoryTable> {
        &self.factories
    }

    /// Run a load pass and register the enabled declarations with `engine`.
    ///
    /// Per-file failures are collected in the returned report and never abort the pass.
    ///
    /// # Errors
    ///
    /// Returns an error if no root was set, or if the root cannot be created or listed.
    pub fn load(&self, engine: &MixinEngine) -> Result<LoadReport> {
        let root = self.root.as_deref().ok_or_else(|| {
            Error::Error("No root directory specified. Use root() to set one.".to_string())
        })?;
        if !root.exists() {
            debug!("Creating mixin directory {}", root.display());
            fs::create_dir_all(root)?;
        }

        let mut paths = Vec::new();
        self.scan(root, &mut paths)?;
        paths.sort();

        let mut report = LoadReport {
            found: paths.len(),
            ..LoadReport::default()
        };

        let compiled: Vec<Result<CompiledUnit>> = if self.parallel {
            paths.par_iter().map(|path| self.compile(path)).collect()
        } else {
            paths.iter().map(|path| self.compile(path)).collect()
        };

        for (path, unit) in paths.iter().zip(compiled) {
            let unit = match unit {
                Ok(unit) => unit,
                Err(error) => {
                    report.record_failure(path, &error);
                    continue;
                }
            };
            report.compiled += 1;

            if let Err(error) = self.register(path, unit, engine, &mut report) {
                report.record_failure(path, &error);
            }
        }

        info!("Loaded mixins from {}: {report}", root.display());
        Ok(report)
    }

    /// Collect every file below `dir` some compiler accepts
    fn scan(&self, dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.scan(&path, paths)?;
            } else if self.compiler_for(&path).is_some() {
                paths.push(path);
            }
        }
        Ok(())
    }

    fn compiler_for(&self, path: &Path) -> Option<&dyn SourceCompiler> {
        self.compilers
            .iter()
            .find(|compiler| compiler.accepts(path))
            .map(AsRef::as_ref)
    }

    fn compile(&self, path: &Path) -> Result<CompiledUnit> {
        let compiler = self.compiler_for(path).ok_or_else(|| Error::Compile {
            path: path.to_path_buf(),
            message: "no compiler accepts this file".to_string(),
        })?;
        let bytes = fs::read(path)?;

        debug!("Compiling {} with the {} compiler", path.display(), compiler.name());
        match catch_unwind(AssertUnwindSafe(|| compiler.compile(path, &bytes))) {
            Ok(result) => result,
            Err(_) => Err(Error::Compile {
                path: path.to_path_buf(),
                message: format!("the {} compiler panicked", compiler.name()),
            }),
        }
    }

    /// Define `unit`, construct it and register its declaration if it has one
    fn register(
        &self,
        path: &Path,
        unit: CompiledUnit,
        engine: &MixinEngine,
        report: &mut LoadReport,
    ) -> Result<()> {
        let defined = self
            .units
            .define(&unit.name, unit.bytes, Some(path.to_path_buf()))?;
        let Some(factory) = unit.factory else {
            debug!("Defined {} from {}", defined.name, path.display());
            return Ok(());
        };

        self.factories
            .register(&defined.name, ConstructorSignature::default(), factory);
        let instance = self.factories.construct_default(&defined.name)?;
        let Some(declaration) = instance.as_declaration() else {
            debug!("{} is not a mixin declaration", defined.name);
            return Ok(());
        };

        if !declaration.enabled() {
            debug!("Skipping disabled declaration {}", declaration.name());
            report.disabled += 1;
            return Ok(());
        }

        let bundle = declaration.to_bundle();
        let rules = bundle.rules.len();
        let target = bundle.target_unit.clone();
        let sequence = engine.register(bundle);
        debug!(
            "Registered {} ({rules} rules) for {target} as #{sequence}",
            declaration.name()
        );
        report.registered += 1;
        Ok(())
    }
}

impl fmt::Debug for MixinLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixinLoader")
            .field("root", &self.root)
            .field(
                "compilers",
                &self.compilers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("parallel", &self.parallel)
            .field("units", &self.units.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::sample_class;

    const VALID: &str = r#"<mixin name="NAME" target="com.example.Player" priority="PRIORITY">
        <overwrite method="getHealth" handler="com.example.Hooks.health"/>
    </mixin>"#;

    fn declaration(name: &str, priority: i32) -> String {
        VALID
            .replace("NAME", name)
            .replace("PRIORITY", &priority.to_string())
    }

    fn write(dir: &Path, name: &str, contents: &[u8]) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_failing_file_does_not_stop_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.mixin.xml", declaration("A", 1000).as_bytes());
        write(dir.path(), "b.mixin.xml", b"<mixin name=\"B\"><broken");
        write(dir.path(), "c.mixin.xml", declaration("C", 1000).as_bytes());

        let engine = MixinEngine::new();
        let report = MixinLoader::new().root(dir.path()).load(&engine).unwrap();

        assert_eq!(report.found, 3);
        assert_eq!(report.compiled, 2);
        assert_eq!(report.registered, 2);
        assert_eq!(report.failure_count(), 1);
        assert!(report.failures[0].0.ends_with("b.mixin.xml"));
        assert_eq!(engine.registry().bundle_count(), 2);
    }

    #[test]
    fn test_missing_root_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("config").join("mixins");

        let engine = MixinEngine::new();
        let report = MixinLoader::new().root(&root).load(&engine).unwrap();

        assert!(root.is_dir());
        assert_eq!(report, LoadReport::default());
        assert!(report.is_complete_success());
    }

    #[test]
    fn test_no_root_is_an_error() {
        let engine = MixinEngine::new();
        assert!(MixinLoader::new().load(&engine).is_err());
    }

    #[test]
    fn test_recursive_scan_and_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "z/last.mixin.xml", declaration("Last", 1000).as_bytes());
        write(dir.path(), "a/first.mixin.xml", declaration("First", 1000).as_bytes());
        write(dir.path(), "m.mixin.xml", declaration("Middle", 1000).as_bytes());
        write(dir.path(), "notes.txt", b"ignored");

        for parallel in [false, true] {
            let engine = MixinEngine::new();
            let report = MixinLoader::new()
                .root(dir.path())
                .parallel(parallel)
                .load(&engine)
                .unwrap();
            assert_eq!(report.found, 3);
            assert_eq!(report.registered, 3);

            let names: Vec<String> = engine
                .lookup("com.example.Player")
                .iter()
                .map(|entry| entry.bundle.name.clone())
                .collect();
            assert_eq!(names, ["First", "Middle", "Last"]);
        }
    }

    #[test]
    fn test_disabled_and_class_units() {
        let dir = tempfile::tempdir().unwrap();
        let disabled = declaration("Off", 1000).replace("priority=", "enabled=\"false\" priority=");
        write(dir.path(), "off.mixin.xml", disabled.as_bytes());
        write(dir.path(), "Player.class", &sample_class());

        let engine = MixinEngine::new();
        let loader = MixinLoader::new().root(dir.path());
        let report = loader.load(&engine).unwrap();

        assert_eq!(report.found, 2);
        assert_eq!(report.compiled, 2);
        assert_eq!(report.registered, 0);
        assert_eq!(report.disabled, 1);
        assert!(report.is_complete_success());
        assert!(loader.units().contains("com.example.Player"));
        assert!(loader.units().contains("Off"));
        assert_eq!(engine.registry().bundle_count(), 0);
    }

    #[test]
    fn test_duplicate_unit_names_fail_the_second_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.mixin.xml", declaration("Same", 1000).as_bytes());
        write(dir.path(), "2.mixin.xml", declaration("Same", 500).as_bytes());

        let engine = MixinEngine::new();
        let report = MixinLoader::new().root(dir.path()).load(&engine).unwrap();

        assert_eq!(report.compiled, 2);
        assert_eq!(report.registered, 1);
        assert_eq!(report.failure_count(), 1);
        assert!(report.failures[0].0.ends_with("2.mixin.xml"));
    }

    struct Panicking;

    impl SourceCompiler for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn accepts(&self, path: &Path) -> bool {
            path.extension().is_some_and(|ext| ext == "boom")
        }

        fn compile(&self, _path: &Path, _bytes: &[u8]) -> Result<CompiledUnit> {
            panic!("compiler bug");
        }
    }

    #[test]
    fn test_panicking_compiler_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "x.boom", b"");
        write(dir.path(), "y.mixin.xml", declaration("Y", 1000).as_bytes());

        let engine = MixinEngine::new();
        let report = MixinLoader::new()
            .with_compiler(Panicking)
            .root(dir.path())
            .load(&engine)
            .unwrap();

        assert_eq!(report.found, 2);
        assert_eq!(report.registered, 1);
        assert_eq!(report.failure_count(), 1);
        assert!(report.failures[0].1.contains("panicked"));
    }
}
