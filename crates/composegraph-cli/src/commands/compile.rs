use super::{
    colorize_outcome, json_pretty, spin_fail, spin_ok, spinner, EXIT_PARTIAL, EXIT_SUCCESS,
};
use composegraph_core::{CompileReport, Compiler, Config, ManifestOutcome};
use composegraph_store::GraphStore;
use std::path::Path;

fn print_report(report: &CompileReport) {
    for m in &report.manifests {
        match &m.outcome {
            ManifestOutcome::Skipped { error } => {
                println!("{:<10} {}: {error}", colorize_outcome("skipped"), m.source_file);
            }
            ManifestOutcome::Compiled {
                services,
                units,
                warnings,
            } => {
                let failed: Vec<_> = units.iter().filter(|u| !u.succeeded()).collect();
                let outcome = if failed.is_empty() { "compiled" } else { "partial" };
                println!(
                    "{:<10} {} ({services} service(s))",
                    colorize_outcome(outcome),
                    m.source_file
                );
                for w in warnings {
                    println!("  warning: {w}");
                }
                for u in failed {
                    if let Some(f) = &u.failure {
                        match (&f.statement_index, &f.statement) {
                            (Some(i), Some(stmt)) => {
                                println!("  {} failed at statement {i} ({stmt}): {}", u.unit, f.error);
                            }
                            _ => println!("  {} failed: {}", u.unit, f.error),
                        }
                    }
                }
            }
        }
    }
    let totals = report.totals();
    println!(
        "{} manifest(s), {} node(s) created, {} relationship(s) created, {} removed",
        report.manifests.len(),
        totals.nodes_created,
        totals.relationships_created,
        totals.relationships_deleted
    );
    if report.aborted {
        println!("{}", console::style("aborted by operator").red().bold());
    }
}

/// Compile `target` (a manifest file or a directory; the configured
/// directory when absent).
pub fn run(
    store: &dyn GraphStore,
    config: &Config,
    target: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    // Fail fast with a store error instead of one failed unit per service.
    store
        .open_session()
        .map_err(|e| format!("store error: {e}"))?;

    let compiler = Compiler::new(store, config).map_err(|e| e.to_string())?;
    let target = target.unwrap_or(config.manifests.dir.as_path());

    let pb = if json {
        None
    } else {
        Some(spinner(&format!("compiling {}...", target.display())))
    };
    let result = if target.is_file() {
        Ok(compiler.compile_file(target))
    } else {
        compiler.compile_dir(target)
    };
    let report = match result {
        Ok(r) => r,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "compilation failed");
            }
            return Err(e.to_string());
        }
    };
    if let Some(ref pb) = pb {
        if report.is_complete() {
            spin_ok(pb, "graph compiled");
        } else {
            spin_fail(pb, "graph partially compiled");
        }
    }

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(if report.is_complete() {
        EXIT_SUCCESS
    } else {
        EXIT_PARTIAL
    })
}
