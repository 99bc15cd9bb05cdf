//! Background watch session
//!
//! The session sweeps the scripts directory once, then reformats each
//! script as soon as it is written.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Subcommand;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use super::output::Output;
use crate::format::{event_channel, ChangeEvent, EventWorker, Formatter, Outcome};
use crate::storage::{Project, SessionLog};

#[derive(Subcommand)]
pub enum WatchCommands {
    /// Start watching the scripts directory
    Start {
        /// Run in foreground (don't detach)
        #[arg(long)]
        foreground: bool,

        /// Suppress startup message
        #[arg(long)]
        quiet: bool,
    },

    /// Stop the watch session
    Stop,

    /// Show watch session status
    Status,

    /// View the session log
    Logs {
        /// Number of lines to show (default: 50)
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,

        /// Follow log output (like tail -f)
        #[arg(short = 'F', long)]
        follow: bool,
    },
}

pub fn run(cmd: WatchCommands, output: &Output) -> Result<()> {
    match cmd {
        WatchCommands::Start { foreground, quiet } => start(output, foreground, quiet),
        WatchCommands::Stop => stop(output),
        WatchCommands::Status => status(output),
        WatchCommands::Logs { lines, follow } => logs(output, lines, follow),
    }
}

/// PID of the running session, stored in `.shellfmt/watch.pid`
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn for_project(project: &Project) -> Self {
        Self {
            path: project.pid_path(),
        }
    }

    fn read(&self) -> Result<Option<u32>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).context("Failed to read PID file")?;
        Ok(content.trim().parse().ok())
    }

    fn write(&self, pid: u32) -> Result<()> {
        fs::write(&self.path, pid.to_string()).context("Failed to write PID file")
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to remove PID file")?;
        }
        Ok(())
    }

    /// Returns the PID if that process is still alive, clearing a stale file
    fn live(&self) -> Result<Option<u32>> {
        match self.read()? {
            Some(pid) if is_process_running(pid) => Ok(Some(pid)),
            Some(_) => {
                self.remove()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// Checks if a process with the given PID is running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }
}

fn start(output: &Output, foreground: bool, quiet: bool) -> Result<()> {
    let project = Project::open_current()?;
    let pid_file = PidFile::for_project(&project);
    let config = &project.config().project;

    if let Some(pid) = pid_file.live()? {
        if output.is_json() {
            output.data(&serde_json::json!({
                "status": "already_running",
                "pid": pid,
                "project": project.root().display().to_string(),
            }));
        } else {
            output.error(&format!(
                "Watch session already running for this project (PID: {})",
                pid
            ));
        }
        return Ok(());
    }

    if !config.watch.enabled {
        if output.is_json() {
            output.data(&serde_json::json!({
                "status": "disabled",
                "message": "Watching is disabled in config",
            }));
        } else {
            output.error(
                "Watching is disabled in config. Set watch.enabled = true in .shellfmt/config.toml",
            );
        }
        return Ok(());
    }

    // Fail here rather than inside the detached child
    project.require_scripts_dir()?;

    if foreground {
        let pid = std::process::id();
        let log = project.session_log();
        pid_file.write(pid)?;
        log.write(&format!("Watch session starting in foreground (PID: {})", pid))?;

        if !quiet {
            if output.is_json() {
                output.data(&serde_json::json!({
                    "status": "started",
                    "pid": pid,
                    "foreground": true,
                    "project": project.root().display().to_string(),
                }));
            } else {
                output.success(&format!("Watching {} (PID: {})", config.scripts_dir.display(), pid));
            }
        }

        let result = run_session(&project, &log);
        if let Err(e) = &result {
            log.write(&format!("Watch session failed: {:#}", e))?;
        }

        pid_file.remove()?;
        log.write("Watch session stopped")?;
        result?;
    } else {
        let exe = std::env::current_exe()?;

        let mut cmd = Command::new(&exe);
        cmd.args(["watch", "start", "--foreground", "--quiet"])
            .current_dir(project.root())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x00000008;
            cmd.creation_flags(DETACHED_PROCESS);
        }

        let child = cmd.spawn().context("Failed to spawn watch process")?;
        let pid = child.id();

        if output.is_json() {
            output.data(&serde_json::json!({
                "status": "started",
                "pid": pid,
                "project": project.root().display().to_string(),
            }));
        } else if !quiet {
            output.success(&format!("Watch session started (PID: {})", pid));
        }
    }

    Ok(())
}

fn stop(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let pid_file = PidFile::for_project(&project);

    let Some(pid) = pid_file.live()? else {
        if output.is_json() {
            output.data(&serde_json::json!({
                "status": "not_running",
                "project": project.root().display().to_string(),
            }));
        } else {
            println!("No watch session is running for this project");
        }
        return Ok(());
    };

    #[cfg(unix)]
    {
        Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status()
            .context("Failed to send TERM signal")?;
    }

    #[cfg(windows)]
    {
        Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .status()
            .context("Failed to terminate process")?;
    }

    let start = Instant::now();
    while is_process_running(pid) && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(100));
    }

    if is_process_running(pid) {
        #[cfg(unix)]
        {
            Command::new("kill").args(["-9", &pid.to_string()]).status()?;
        }

        #[cfg(windows)]
        {
            Command::new("taskkill")
                .args(["/F", "/PID", &pid.to_string()])
                .status()?;
        }
    }

    // A killed session cannot clean up after itself
    pid_file.remove()?;
    project.session_log().write("Watch session stopped by user")?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "status": "stopped",
            "pid": pid,
            "project": project.root().display().to_string(),
        }));
    } else {
        output.success(&format!("Watch session stopped (PID: {})", pid));
    }

    Ok(())
}

fn status(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    let running = PidFile::for_project(&project).live()?;
    let config = &project.config().project;

    if output.is_json() {
        let mut status = serde_json::json!({
            "running": running.is_some(),
            "project": project.root().display().to_string(),
            "scripts_dir": config.scripts_dir.display().to_string(),
        });

        if let Some(pid) = running {
            status["pid"] = serde_json::json!(pid);
        }

        status["config"] = serde_json::json!({
            "enabled": config.watch.enabled,
            "queue_capacity": config.watch.queue_capacity,
            "extensions": config.format.extensions,
            "on_non_script": config.format.on_non_script.as_str(),
            "write_strategy": config.format.write_strategy.as_str(),
        });

        output.data(&status);
    } else {
        println!("Project: {}", project.root().display());
        match running {
            Some(pid) => println!("Watch status: RUNNING (PID: {})", pid),
            None => println!("Watch status: STOPPED"),
        }

        println!();
        println!("Configuration:");
        println!("  Enabled: {}", config.watch.enabled);
        println!("  Scripts directory: {}", config.scripts_dir.display());
        println!("  Extensions: {}", config.format.extensions.join(", "));
        println!("  Non-scripts: {}", config.format.on_non_script.as_str());
        println!("  Write strategy: {}", config.format.write_strategy.as_str());
    }

    Ok(())
}

fn logs(output: &Output, lines: usize, follow: bool) -> Result<()> {
    let project = Project::open_current()?;
    let log = project.session_log();

    if !log.path().exists() {
        if output.is_json() {
            output.data(&serde_json::json!({
                "logs": [],
                "message": "No log file found",
                "project": project.root().display().to_string(),
            }));
        } else {
            println!("No watch logs found for this project");
        }
        return Ok(());
    }

    if follow {
        return follow_log(log.path());
    }

    let (shown, total) = log.tail(lines)?;
    if output.is_json() {
        output.data(&serde_json::json!({
            "logs": shown,
            "total_lines": total,
            "showing": shown.len(),
        }));
    } else {
        for line in shown {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Prints the end of the log, then new lines as they arrive
fn follow_log(path: &Path) -> Result<()> {
    let mut reader = BufReader::new(File::open(path)?);

    let start_pos = fs::metadata(path)?.len().saturating_sub(4096);
    reader.seek(SeekFrom::Start(start_pos))?;

    // Skip partial first line if we didn't start at beginning
    if start_pos > 0 {
        let mut partial = String::new();
        reader.read_line(&mut partial)?;
    }

    for line in reader.by_ref().lines() {
        println!("{}", line?);
    }

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => std::thread::sleep(Duration::from_millis(100)),
            Ok(_) => print!("{}", line),
            Err(e) => {
                eprintln!("Error reading log: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Sweeps once, then formats scripts as they are written
fn run_session(project: &Project, log: &SessionLog) -> Result<()> {
    let config = &project.config().project;
    let scripts_dir = project.require_scripts_dir()?;
    let mut formatter =
        Formatter::from_config(&config.format).context("Invalid format settings")?;

    log.write(&format!("Watching directory: {}", scripts_dir.display()))?;

    // Catch up on edits made while nobody was watching
    {
        let _lock = project
            .lock_formatting()
            .context("Failed to take the format lock")?;
        let start = Instant::now();
        match formatter.format_directory(&scripts_dir) {
            Ok(report) => log.write(&format!(
                "Initial sweep: {} rewritten, {} unchanged, {} skipped ({}ms)",
                report.changed.len(),
                report.unchanged,
                report.skipped.len(),
                start.elapsed().as_millis()
            ))?,
            Err(e) => log.write(&format!(
                "Initial sweep failed after {}ms: {}",
                start.elapsed().as_millis(),
                e
            ))?,
        }
    }

    let (tx, rx) = event_channel(config.watch.queue_capacity);
    let watch_log = log.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for change in ChangeEvent::from_notify(&event) {
                    if tx.send(change).is_err() {
                        return;
                    }
                }
            }
            Err(error) => {
                let _ = watch_log.write(&format!("Watch error: {:?}", error));
            }
        },
        notify::Config::default(),
    )
    .context("Failed to create file watcher")?;

    watcher
        .watch(&scripts_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", scripts_dir.display()))?;

    log.write(&format!(
        "Watch session ready (extensions: {}, queue: {}, write strategy: {})",
        formatter.settings().extensions.as_slice().join(" "),
        config.watch.queue_capacity,
        config.format.write_strategy.as_str()
    ))?;

    let log_unchanged = config.watch.log_unchanged;
    // Our own rewrites come back as write events and settle as Unchanged
    EventWorker::new(formatter, rx)
        .with_lock(project.lock_path())
        .run(|event, result| {
            let shown = project
                .relative_path(&event.path)
                .unwrap_or_else(|| event.path.clone());
            let message = match result {
                Ok(Outcome::Rewritten) => Some(format!("Formatted {}", shown.display())),
                Ok(outcome) if log_unchanged => {
                    Some(format!("{}: {}", shown.display(), outcome.as_str()))
                }
                Ok(_) => None,
                Err(e) => Some(format!("Failed to format {}: {}", shown.display(), e)),
            };
            if let Some(message) = message {
                let _ = log.write(&message);
            }
        });

    drop(watcher);
    Ok(())
}
