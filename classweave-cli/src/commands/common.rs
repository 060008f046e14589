use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use classweave::{
    loader::{LoadReport, MixinLoader},
    mixin::{EngineConfig, Mappings, MixinEngine},
    File,
};

use crate::app::EngineOptions;

/// Memory-map a class file.
pub fn load_file(path: &Path) -> anyhow::Result<File> {
    File::from_file(path).with_context(|| format!("failed to open class file: {}", path.display()))
}

/// Build an engine from the command-line options and load the declaration directory into it.
pub fn load_engine(
    options: &EngineOptions,
    audit: bool,
) -> anyhow::Result<(MixinEngine, LoadReport)> {
    let mut config = if options.strict {
        EngineConfig::strict()
    } else {
        EngineConfig::new()
    };
    config.audit = audit;
    if let Some(path) = &options.mappings {
        let mappings = Mappings::from_file(path)
            .with_context(|| format!("failed to read mappings: {}", path.display()))?;
        log::debug!("Loaded {} mapping(s) from {}", mappings.len(), path.display());
        config.mappings = Some(Arc::new(mappings));
    }

    let engine = MixinEngine::with_config(config);
    let report = MixinLoader::new()
        .root(&options.mixins)
        .parallel(!options.serial)
        .load(&engine)
        .with_context(|| format!("failed to load mixins from: {}", options.mixins.display()))?;
    Ok((engine, report))
}

/// Collect all `.class` files recursively from a directory, sorted.
pub fn collect_classes(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_classes_recursive(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_classes_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_classes_recursive(&path, files)?;
        } else if is_class_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Returns true if the path has a `.class` extension.
pub fn is_class_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("class")
}
