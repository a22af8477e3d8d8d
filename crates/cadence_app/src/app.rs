use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cadence_domain::{
    label::TargetStyle,
    migration::RecurrenceFields,
    monitor::Monitor,
    notifications::LogSink,
    service::{ActivityReport, NewActivity},
    store::JsonActivityStore,
    ActivityId, EngineConfig, OwnerId, TrackerService,
};
use chrono::Local;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_STORE_FILE: &str = "activities.json";
const DEFAULT_OWNER: &str = "local";
const ADD_USAGE: &str = "usage: add <value> <unit> <name>";
const HELP: &str = "\
commands:
  list                          show every activity, most overdue first
  add <value> <unit> <name>     track a new activity (units: hours, days, weeks, months, years)
  done <id>                     record a completion now
  remove <id>                   stop tracking an activity
  quit                          stop the monitor and exit";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub(crate) store_path: PathBuf,
    pub(crate) owner: OwnerId,
    pub(crate) engine: EngineConfig,
    pub(crate) watch: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("CADENCE_STORE") {
            if !path.trim().is_empty() {
                config.store_path = PathBuf::from(path.trim());
            }
        }
        if let Some(owner) = lookup("CADENCE_OWNER") {
            if !owner.trim().is_empty() {
                config.owner = OwnerId::from(owner.trim());
            }
        }
        if let Some(value) = parsed_var(&lookup, "CADENCE_COOLDOWN_SECS") {
            config.engine.cooldown_secs = value;
        }
        if let Some(value) = parsed_var(&lookup, "CADENCE_INTERVAL_SECS") {
            config.engine.evaluation_interval_secs = value;
        }
        if let Some(value) = parsed_var(&lookup, "CADENCE_LABEL_CUTOFF") {
            config.engine.label_cutoff = value;
        }
        if let Some(raw) = lookup("CADENCE_TARGET_STYLE") {
            match parse_target_style(&raw) {
                Some(style) => config.engine.target_style = style,
                None => warn!(value = %raw, "ignoring unknown CADENCE_TARGET_STYLE"),
            }
        }
        if let Some(raw) = lookup("CADENCE_WATCH") {
            match parse_flag(&raw) {
                Some(flag) => config.watch = flag,
                None => warn!(value = %raw, "ignoring unparseable CADENCE_WATCH"),
            }
        }
        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            owner: OwnerId::from(DEFAULT_OWNER),
            engine: EngineConfig::default(),
            watch: false,
        }
    }
}

fn parsed_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = %raw, %err, "ignoring unparseable setting");
            None
        }
    }
}

fn parse_target_style(raw: &str) -> Option<TargetStyle> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "configured" => Some(TargetStyle::Configured),
        "cascade" => Some(TargetStyle::Cascade),
        _ => None,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    List,
    Add {
        value: i64,
        unit: String,
        name: String,
    },
    Done(ActivityId),
    Remove(ActivityId),
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            bail!("empty command");
        };
        match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => Ok(Command::List),
            "add" => {
                let raw_value = parts.next().context(ADD_USAGE)?;
                let value = raw_value
                    .parse::<i64>()
                    .with_context(|| format!("`{raw_value}` is not a whole number"))?;
                let unit = parts.next().context(ADD_USAGE)?.to_string();
                let name = parts.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    bail!(ADD_USAGE);
                }
                Ok(Command::Add { value, unit, name })
            }
            "done" => Ok(Command::Done(activity_arg(parts.next(), "done")?)),
            "remove" | "rm" => Ok(Command::Remove(activity_arg(parts.next(), "remove")?)),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => bail!("unknown command `{other}`; try `help`"),
        }
    }
}

fn activity_arg(arg: Option<&str>, verb: &str) -> Result<ActivityId> {
    match arg {
        Some(id) => Ok(ActivityId::from(id)),
        None => bail!("usage: {verb} <id>"),
    }
}

pub(crate) fn format_row(report: &ActivityReport) -> String {
    let marker = if report.status.is_overdue() { "!" } else { " " };
    let last = report
        .last_completed_at
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{marker} {:<24} {:>10} {:>4.0}%  last {last}  [{}]",
        report.name,
        report.label,
        report.progress * 100.0,
        report.id
    )
}

fn write_dashboard(service: &TrackerService, owner: &OwnerId, out: &mut impl Write) -> Result<()> {
    let reports = service.dashboard(owner)?;
    if reports.is_empty() {
        writeln!(out, "no activities yet; {ADD_USAGE}")?;
        return Ok(());
    }
    for report in &reports {
        writeln!(out, "{}", format_row(report))?;
    }
    Ok(())
}

/// Runs one command. Returns `false` once the session should end.
fn execute(
    service: &TrackerService,
    owner: &OwnerId,
    command: Command,
    out: &mut impl Write,
) -> Result<bool> {
    match command {
        Command::List => write_dashboard(service, owner, out)?,
        Command::Add { value, unit, name } => {
            let activity = service.create_activity(
                owner,
                NewActivity {
                    name,
                    description: String::new(),
                    recurrence: RecurrenceFields::pair(value, unit),
                },
            )?;
            writeln!(
                out,
                "added {} ({}) [{}]",
                activity.name, activity.recurrence, activity.id
            )?;
        }
        Command::Done(id) => {
            let activity = service.mark_done(owner, &id)?;
            writeln!(out, "marked {} done", activity.name)?;
        }
        Command::Remove(id) => {
            let activity = service.remove_activity(owner, &id)?;
            writeln!(out, "removed {}", activity.name)?;
        }
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Prints the dashboard, then reads commands until `quit` or end of input.
/// A failing command is reported and the session carries on.
pub(crate) fn run_commands<R: BufRead, W: Write>(
    service: &TrackerService,
    owner: &OwnerId,
    input: R,
    mut out: W,
) -> Result<()> {
    write_dashboard(service, owner, &mut out)?;
    for line in input.lines() {
        let line = line.context("failed to read command")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let outcome = line
            .parse::<Command>()
            .and_then(|command| execute(service, owner, command, &mut out));
        match outcome {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                warn!(command = line, error = %err, "command failed");
                writeln!(out, "error: {err:#}")?;
            }
        }
        out.flush()?;
    }
    Ok(())
}

/// Logs go to stderr; stdout belongs to the command session.
pub fn log_subscriber() -> impl tracing::Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish()
}

pub fn run(config: AppConfig) -> Result<()> {
    let store = Arc::new(
        JsonActivityStore::open(&config.store_path).with_context(|| {
            format!("failed to open activity store {}", config.store_path.display())
        })?,
    );
    if config.watch {
        store.watch().context("failed to watch activity store")?;
    }
    info!(
        store = %config.store_path.display(),
        owner = %config.owner,
        watch = config.watch,
        "starting cadence"
    );

    let service = Arc::new(
        TrackerService::builder()
            .with_store(store)
            .with_notification_sink(Box::new(LogSink))
            .with_config(config.engine.clone())
            .build(),
    );
    let monitor = Monitor::spawn(Arc::clone(&service), service.config().evaluation_interval())?;

    let stdin = io::stdin();
    let session = run_commands(&service, &config.owner, stdin.lock(), io::stdout());

    let passes = monitor.stop()?;
    info!(passes, "cadence stopped");
    session
}
