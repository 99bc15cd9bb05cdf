//! Format and check commands

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::output::Output;
use crate::format::{FormatError, Formatter, ScanReport};
use crate::storage::{FormatLock, Project};

/// Formats the scripts directory, or the given files
pub fn format(output: &Output, paths: &[PathBuf], dry_run: bool) -> Result<()> {
    let project = Project::open_current()?;
    run(output, &project, paths, dry_run)?;
    Ok(())
}

/// Fails if a sweep would rewrite anything
pub fn check(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let report = run(output, &project, &[], true)?;

    if !report.changed.is_empty() {
        anyhow::bail!("{} script(s) need formatting", report.changed.len());
    }
    Ok(())
}

fn run(output: &Output, project: &Project, paths: &[PathBuf], dry_run: bool) -> Result<ScanReport> {
    let settings = &project.config().project.format;
    let mut formatter = Formatter::from_config(settings).context("Invalid format settings")?;
    formatter.set_dry_run(dry_run);

    let targets = paths
        .iter()
        .map(|path| project.designated_path(path))
        .collect::<Result<Vec<_>>>()?;
    let scripts_dir = project.require_scripts_dir()?;

    output.verbose_ctx(
        "format",
        &format!(
            "scripts_dir={}, on_non_script={}, write_strategy={}, dry_run={}",
            scripts_dir.display(),
            settings.on_non_script.as_str(),
            settings.write_strategy.as_str(),
            dry_run
        ),
    );

    let lock_path = project.lock_path();
    let _lock = match FormatLock::try_acquire(&lock_path).context("Failed to open the format lock")? {
        Some(lock) => lock,
        None => {
            output.warn("Another shellfmt run is formatting this project, waiting for it");
            project
                .lock_formatting()
                .context("Failed to take the format lock")?
        }
    };
    output.verbose_ctx("format", &format!("Holding {}", lock_path.display()));

    let start = Instant::now();
    let result = if targets.is_empty() {
        formatter.format_directory(&scripts_dir)
    } else {
        formatter.format_files(&targets)
    };
    let elapsed = start.elapsed();

    match result {
        Ok(report) => {
            print_report(output, project, &report, elapsed, dry_run);
            Ok(report)
        }
        Err(e) => {
            if let FormatError::NotAShellScript(path) = &e {
                output.warn(&format!(
                    "stopped at {} because on_non_script = \"abort\"",
                    display_path(project, path)
                ));
            }
            Err(anyhow::Error::new(e).context(format!(
                "Formatting failed after {}",
                format_elapsed(elapsed)
            )))
        }
    }
}

fn print_report(
    output: &Output,
    project: &Project,
    report: &ScanReport,
    elapsed: Duration,
    dry_run: bool,
) {
    if output.is_json() {
        let paths = |list: &[PathBuf]| -> Vec<String> {
            list.iter().map(|p| display_path(project, p)).collect()
        };
        output.data(&serde_json::json!({
            "dry_run": dry_run,
            "changed": paths(&report.changed),
            "unchanged": report.unchanged,
            "no_shebang": report.no_shebang,
            "empty_output": report.empty_output,
            "skipped": paths(&report.skipped),
            "vanished": report.vanished,
            "elapsed_ms": elapsed.as_millis() as u64,
        }));
        return;
    }

    let verb = if dry_run { "Would rewrite" } else { "Rewrote" };
    for path in &report.changed {
        output.line(&format!("{} {}", verb, display_path(project, path)));
    }
    for path in &report.skipped {
        output.verbose_ctx("format", &format!("Skipped {}", display_path(project, path)));
    }

    let mut summary = format!(
        "{} file(s) examined: {} {}, {} unchanged",
        report.examined(),
        report.changed.len(),
        if dry_run { "to rewrite" } else { "rewritten" },
        report.unchanged
    );
    if report.no_shebang > 0 {
        summary.push_str(&format!(", {} without a shell shebang", report.no_shebang));
    }
    if report.empty_output > 0 {
        summary.push_str(&format!(", {} with empty output", report.empty_output));
    }
    if !report.skipped.is_empty() {
        summary.push_str(&format!(", {} skipped", report.skipped.len()));
    }
    if report.vanished > 0 {
        summary.push_str(&format!(", {} vanished", report.vanished));
    }
    output.line(&format!("{} ({})", summary, format_elapsed(elapsed)));
}

fn display_path(project: &Project, path: &Path) -> String {
    project
        .relative_path(path)
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_human_readable() {
        assert_eq!(format_elapsed(Duration::from_millis(12)), "12ms");
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.50s");
    }
}
