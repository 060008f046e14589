use serde::Serialize;

use crate::{
    app::{EngineOptions, GlobalOptions},
    commands::common::load_engine,
    output::{print_output, Align, Columns},
};

#[derive(Debug, Serialize)]
pub struct RuleListing {
    pub found: usize,
    pub registered: usize,
    pub disabled: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureEntry>,
    pub bundles: Vec<BundleEntry>,
}

#[derive(Debug, Serialize)]
pub struct FailureEntry {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BundleEntry {
    pub target: String,
    pub name: String,
    pub priority: i32,
    pub sequence: u64,
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Serialize)]
pub struct RuleEntry {
    pub kind: String,
    pub method: Option<String>,
    pub remap: bool,
}

pub fn run(
    options: &EngineOptions,
    target: Option<&str>,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let (engine, report) = load_engine(options, false)?;
    let wanted = target.map(|target| target.replace('.', "/"));

    let mut bundles = Vec::new();
    for unit in engine.registry().targets() {
        if wanted.as_deref().is_some_and(|wanted| wanted != unit) {
            continue;
        }
        for registered in engine.lookup(&unit).iter() {
            let bundle = &registered.bundle;
            bundles.push(BundleEntry {
                target: unit.clone(),
                name: bundle.name.clone(),
                priority: bundle.priority,
                sequence: registered.sequence,
                rules: bundle
                    .rules
                    .iter()
                    .map(|rule| RuleEntry {
                        kind: rule.kind().to_string(),
                        method: rule.method().map(ToString::to_string),
                        remap: rule.remap(),
                    })
                    .collect(),
            });
        }
    }

    let listing = RuleListing {
        found: report.found,
        registered: report.registered,
        disabled: report.disabled,
        failures: report
            .failures
            .iter()
            .map(|(path, message)| FailureEntry {
                path: path.display().to_string(),
                message: message.clone(),
            })
            .collect(),
        bundles,
    };

    print_output(&listing, opts, |listing| {
        println!(
            "{} declaration(s), {} registered, {} disabled, {} failed",
            listing.found,
            listing.registered,
            listing.disabled,
            listing.failures.len()
        );
        for failure in &listing.failures {
            println!("  FAIL  {}: {}", failure.path, failure.message);
        }

        let mut current = None;
        for bundle in &listing.bundles {
            if current != Some(&bundle.target) {
                println!("\n{}", bundle.target);
                current = Some(&bundle.target);
            }
            println!(
                "  {} (priority {}, #{})",
                bundle.name, bundle.priority, bundle.sequence
            );
            let mut table = Columns::new(&[
                ("Kind", Align::Left),
                ("Method", Align::Left),
                ("Remap", Align::Left),
            ])
            .indent("    ");
            for rule in &bundle.rules {
                table.row(vec![
                    rule.kind.clone(),
                    rule.method.clone().unwrap_or_else(|| "-".to_string()),
                    if rule.remap { "yes" } else { "no" }.to_string(),
                ]);
            }
            if !table.is_empty() {
                table.print();
            }
        }
    })
}
