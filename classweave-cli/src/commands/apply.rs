use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use classweave::{classfile::ClassFile, mixin::MixinEngine};
use serde::Serialize;

use crate::{
    app::{EngineOptions, GlobalOptions},
    commands::common::{collect_classes, load_engine},
    output::print_output,
};

#[derive(Debug, Serialize)]
pub struct ApplyReport {
    pub declarations: String,
    pub processed: usize,
    pub transformed: usize,
    pub unchanged: usize,
    pub units: Vec<UnitEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_records: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct UnitEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applied: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

/// Input/output pairs; a directory input mirrors its layout below `output`
fn plan(input: &Path, output: &Path) -> anyhow::Result<Vec<(PathBuf, PathBuf)>> {
    if !input.is_dir() {
        return Ok(vec![(input.to_path_buf(), output.to_path_buf())]);
    }
    collect_classes(input)?
        .into_iter()
        .map(|source| {
            let relative = source.strip_prefix(input)?.to_path_buf();
            Ok::<_, anyhow::Error>((source, output.join(relative)))
        })
        .collect()
}

fn apply_one(
    engine: &MixinEngine,
    source: &Path,
    destination: &Path,
) -> anyhow::Result<UnitEntry> {
    let input =
        fs::read(source).with_context(|| format!("failed to read: {}", source.display()))?;

    let parsed = ClassFile::parse(&input).and_then(|class| class.this_name().map(str::to_string));
    let unit = match parsed {
        Ok(unit) => Some(unit),
        Err(err) => {
            log::warn!("{} copied unchanged: {err}", source.display());
            None
        }
    };
    let transformed = unit
        .as_deref()
        .and_then(|unit| engine.transform_unit(unit, &input));

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let (bytes, applied, failed) = match transformed {
        Some(transformed) => (transformed.bytes, transformed.applied, transformed.failed),
        None => (input, Vec::new(), Vec::new()),
    };
    fs::write(destination, bytes)
        .with_context(|| format!("failed to write: {}", destination.display()))?;

    Ok(UnitEntry {
        path: source.display().to_string(),
        unit,
        applied,
        failed,
    })
}

pub fn run(
    options: &EngineOptions,
    input: &Path,
    output: &Path,
    audit: Option<&Path>,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let (engine, load) = load_engine(options, audit.is_some())?;

    let mut units = Vec::new();
    for (source, destination) in plan(input, output)? {
        units.push(apply_one(&engine, &source, &destination)?);
    }

    let audit_records = match audit {
        Some(dir) => Some(
            engine
                .audit()
                .export(dir)
                .with_context(|| format!("failed to export audit to: {}", dir.display()))?,
        ),
        None => None,
    };

    let transformed = units.iter().filter(|unit| !unit.applied.is_empty()).count();
    let report = ApplyReport {
        declarations: load.to_string(),
        processed: units.len(),
        transformed,
        unchanged: units.len() - transformed,
        units,
        diagnostics: engine.diagnostics().iter().map(ToString::to_string).collect(),
        audit_records,
    };

    print_output(&report, opts, |report| {
        println!("Declarations: {}", report.declarations);
        for unit in report.units.iter().filter(|unit| !unit.applied.is_empty()) {
            let name = unit.unit.as_deref().unwrap_or(&unit.path);
            println!("  {name}: {}", unit.applied.join(", "));
        }
        for diagnostic in &report.diagnostics {
            println!("  {diagnostic}");
        }
        println!(
            "{} unit(s): {} transformed, {} unchanged",
            report.processed, report.transformed, report.unchanged
        );
        if let Some(records) = report.audit_records {
            println!("Audit: {records} record(s) exported");
        }
    })
}
