//! `reclink run` / `reclink validate`

use std::path::{Path, PathBuf};
use std::time::Instant;

use reclink_io::{export, source};
use reclink_linkage::summary::{compute_summary, RunReport};
use reclink_linkage::{run_multi, LinkageConfig, LogObserver, MultiLinkageResult};

use crate::exit_codes::{linkage_exit_code, EXIT_PARTIAL, EXIT_RUNTIME};
use crate::CliError;

pub struct RunOptions {
    pub config: PathBuf,
    pub limit: Option<usize>,
    pub json: bool,
    pub no_export: bool,
    pub fail_on_partial: bool,
}

fn read_config(path: &Path) -> Result<LinkageConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::usage(format!("cannot read config {}: {e}", path.display()))
            .with_hint("pass the path to a .link.toml project file")
    })?;
    Ok(LinkageConfig::from_toml(&text)?)
}

fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

pub fn cmd_run(opts: RunOptions) -> Result<(), CliError> {
    let config = read_config(&opts.config)?;
    let base = base_dir(&opts.config);
    let start = Instant::now();

    let datasets = source::load_all(&config.datasets, base, opts.limit)?;
    let multi = run_multi(&datasets, &config.settings, &LogObserver)?;
    let report = compute_summary(&config.name, &multi, start.elapsed());

    if !opts.no_export {
        export_outputs(&config, base, &multi, &report)?;
    }

    if opts.json {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    print_summary(&config, &multi, &report);
    verdict(&multi, opts.fail_on_partial)
}

fn export_outputs(
    config: &LinkageConfig,
    base: &Path,
    multi: &MultiLinkageResult,
    report: &RunReport,
) -> Result<(), CliError> {
    let out = &config.output;

    if let Some(dir) = &out.csv_dir {
        let summary = export::write_all_csv(multi, &source::resolve(base, dir))?;
        for path in &summary.written {
            eprintln!("wrote {path}");
        }
    }

    if let Some(db) = &out.sqlite_path {
        let path = source::resolve(base, db);
        let summary = export::save_sqlite_file(&path, multi, &out.table_prefix)?;
        if !summary.written.is_empty() {
            eprintln!("saved {} table(s) to {}", summary.written.len(), path.display());
        }
    }

    if let Some(json) = &out.json {
        let path = source::resolve(base, json);
        export::write_json(report, &path)?;
        eprintln!("wrote {}", path.display());
    }

    Ok(())
}

fn print_summary(config: &LinkageConfig, multi: &MultiLinkageResult, report: &RunReport) {
    eprintln!(
        "linkage '{}': {} comparison(s), {} with matches, {} failed, {} total match(es) ({}ms)",
        config.name,
        report.comparisons_attempted,
        report.comparisons_with_results,
        report.comparisons_failed,
        report.total_matches,
        report.meta.execution_ms,
    );

    for outcome in &multi.outcomes {
        match &outcome.error {
            Some(err) => eprintln!("  {}: error: {err}", outcome.name),
            None => {
                let stats = outcome
                    .result
                    .index_stats
                    .map(|s| format!(" from {} candidate pair(s)", s.candidates))
                    .unwrap_or_default();
                eprintln!("  {}: {} match(es){stats}", outcome.name, outcome.match_count());
            }
        }
    }
}

/// Exit status for a finished run.
///
/// Every comparison failing is an error with the first cause's code. Some
/// failing is only an error under `--fail-on-partial`.
fn verdict(multi: &MultiLinkageResult, fail_on_partial: bool) -> Result<(), CliError> {
    let failed = multi.failed();
    if failed == 0 {
        return Ok(());
    }

    if failed == multi.attempted() {
        let code = multi
            .outcomes
            .iter()
            .find_map(|o| o.error.as_ref())
            .map(linkage_exit_code)
            .unwrap_or(EXIT_RUNTIME);
        return Err(CliError::new(code, "all comparisons failed"));
    }

    if fail_on_partial {
        return Err(CliError::new(
            EXIT_PARTIAL,
            format!("{failed} of {} comparison(s) failed", multi.attempted()),
        ));
    }

    log::warn!("{failed} of {} comparison(s) failed", multi.attempted());
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let settings = &config.settings;

    let mode = if config.datasets.len() == 1 {
        "deduplication".to_string()
    } else {
        let n = config.datasets.len();
        format!("{} pairwise comparison(s)", n * (n - 1) / 2)
    };

    eprintln!(
        "valid: '{}' with {} dataset(s) [{}], {mode}",
        config.name,
        config.datasets.len(),
        config.dataset_names().join(", "),
    );
    eprintln!(
        "  indexing: {}, comparison rules: {}, classification: {}",
        settings.indexing.method.name(),
        settings.comparison.len(),
        settings.classification.name(),
    );

    let unsupported: Vec<&str> = settings
        .comparison
        .iter()
        .filter(|r| !r.method.is_supported())
        .map(|r| r.field.as_str())
        .collect();
    if !unsupported.is_empty() {
        eprintln!("  warning: unsupported method on field(s) {}; these rules are skipped", unsupported.join(", "));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclink_linkage::model::LinkageResult;
    use reclink_linkage::orchestrate::ComparisonOutcome;
    use reclink_linkage::LinkageError;

    fn outcome(name: &str, error: Option<LinkageError>) -> ComparisonOutcome {
        ComparisonOutcome {
            name: name.into(),
            datasets: vec![],
            result: LinkageResult::empty(),
            error,
        }
    }

    #[test]
    fn verdict_partial_and_total_failure() {
        let schema = || {
            Some(LinkageError::PairJob {
                comparison: "a_c".into(),
                source: Box::new(LinkageError::schema("c", "city")),
            })
        };

        let partial = MultiLinkageResult { outcomes: vec![outcome("a_b", None), outcome("a_c", schema())] };
        assert!(verdict(&partial, false).is_ok());
        assert_eq!(verdict(&partial, true).unwrap_err().code, EXIT_PARTIAL);

        let total = MultiLinkageResult { outcomes: vec![outcome("a_c", schema())] };
        assert_eq!(verdict(&total, false).unwrap_err().code, crate::exit_codes::EXIT_SCHEMA);
    }

    #[test]
    fn base_dir_of_bare_file_name() {
        assert_eq!(base_dir(Path::new("x.toml")), Path::new(""));
        assert_eq!(base_dir(Path::new("/etc/x.toml")), Path::new("/etc"));
    }
}
