// snooze: CLI for temporarily overriding a setting
//
// Commands:
//   snooze set [KEY] [VALUE] [--minutes N]
//   snooze list [--json]
//   snooze clear [--yes]
//   snooze test
//   snooze daemon-stop

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use snooze_setting_lib::snooze::{
    config::Config,
    daemon_client::{response_to_result, DaemonClient},
    notify::{cleared_message, list_message, notify_terminal, snoozed_message, NOTHING_SNOOZED},
    protocol::{DaemonRequest, DaemonResponse, SnoozeEntry},
    registry::{parse_duration, parse_value},
    settings::{default_duration, ConfigStore, JsonSettingsFile},
};
use std::io::{self, BufRead, Write};

#[derive(Parser, Debug)]
#[command(
    name = "snooze",
    version,
    about = "Temporarily override a setting; it is restored automatically"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Snooze a setting (prompts for anything not given)
    Set {
        /// Setting key, e.g. editor.fontSize
        key: Option<String>,
        /// New value as JSON, e.g. 18 or '"on"'
        value: Option<String>,
        /// Duration in minutes (default: snoozeSetting.defaultDuration, else 30)
        #[arg(long, short = 'm')]
        minutes: Option<String>,
    },
    /// List snoozed settings
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Restore every snoozed setting now
    Clear {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Check that the daemon answers
    Test,
    /// Ask the daemon to restore everything and exit
    DaemonStop,
}

/// Ask a question on stdin. An empty answer takes `prefill`; EOF cancels.
fn prompt(question: &str, prefill: Option<&str>) -> Result<Option<String>> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    match prefill {
        Some(value) => write!(stdout, "{} [{}]: ", question, value)?,
        None => write!(stdout, "{}: ", question)?,
    }
    stdout.flush()?;

    let mut line = String::new();
    if stdin.lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let answer = line.trim();

    if answer.is_empty() {
        return Ok(prefill.map(str::to_string));
    }
    Ok(Some(answer.to_string()))
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{} [y/N]", question), None)?;
    Ok(matches!(
        answer.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("y") | Some("yes")
    ))
}

fn cmd_set(
    config: &Config,
    key: Option<String>,
    value: Option<String>,
    minutes: Option<String>,
) -> Result<()> {
    let settings = JsonSettingsFile::new(&config.settings_file);

    let key = match key {
        Some(key) => key,
        None => match prompt(
            "Enter the setting name to snooze (e.g., \"editor.fontSize\")",
            None,
        )? {
            Some(key) => key,
            None => return Ok(()),
        },
    };

    let current = match settings.get(&key)? {
        Some(current) => current,
        None => bail!("Setting \"{}\" not found", key),
    };

    let value = match value {
        Some(value) => value,
        None => {
            let current_text = serde_json::to_string(&current)?;
            match prompt(
                &format!("Enter new value for \"{}\" (current: {})", key, current_text),
                Some(&current_text),
            )? {
                Some(value) => value,
                None => return Ok(()),
            }
        }
    };
    // Fail fast on bad input before talking to the daemon
    parse_value(&value)?;

    let minutes = match minutes {
        Some(minutes) => minutes,
        None => {
            let fallback = default_duration(&settings).to_string();
            match prompt(
                &format!("Enter snooze duration in minutes (default: {})", fallback),
                Some(&fallback),
            )? {
                Some(minutes) => minutes,
                None => return Ok(()),
            }
        }
    };
    let minutes = parse_duration(&minutes)?;

    let mut client = DaemonClient::connect_or_start(config)?;
    let response = client.send(DaemonRequest::Snooze {
        key,
        value,
        minutes,
    })?;
    let record = response_to_result(response, |r| match r {
        DaemonResponse::Snoozed { record } => Some(record),
        _ => None,
    })?;

    let message = snoozed_message(&record, minutes);
    println!("{}", message);
    notify_terminal(&message);
    Ok(())
}

fn fetch_list(config: &Config) -> Result<Vec<SnoozeEntry>> {
    let mut client = DaemonClient::connect_or_start(config)?;
    let response = client.send(DaemonRequest::List)?;
    response_to_result(response, |r| match r {
        DaemonResponse::SnoozeList { entries } => Some(entries),
        _ => None,
    })
}

fn cmd_list(config: &Config, json: bool) -> Result<()> {
    let entries = fetch_list(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("{}", list_message(&entries));
    }
    Ok(())
}

fn cmd_clear(config: &Config, yes: bool) -> Result<()> {
    if fetch_list(config)?.is_empty() {
        println!("{}", NOTHING_SNOOZED);
        return Ok(());
    }

    if !yes && !confirm("Are you sure you want to clear all snoozed settings?")? {
        return Ok(());
    }

    let mut client = DaemonClient::connect_or_start(config)?;
    let response = client.send(DaemonRequest::Clear)?;
    let restored = response_to_result(response, |r| match r {
        DaemonResponse::Cleared { restored } => Some(restored),
        _ => None,
    })?;

    log::debug!("Cleared: {}", restored.join(", "));
    println!("{}", cleared_message());
    Ok(())
}

fn cmd_test(config: &Config) -> Result<()> {
    let mut client = DaemonClient::connect_or_start(config)?;
    let response = client.send(DaemonRequest::Ping)?;
    response_to_result(response, |r| match r {
        DaemonResponse::Pong => Some(()),
        _ => None,
    })?;

    println!("Test command executed");
    Ok(())
}

fn cmd_daemon_stop(config: &Config) -> Result<()> {
    if !config.socket_exists() {
        println!("Daemon is not running");
        return Ok(());
    }

    let mut client = DaemonClient::connect(config)?;
    let response = client.send(DaemonRequest::Shutdown)?;
    response_to_result(response, |r| match r {
        DaemonResponse::ShuttingDown => Some(()),
        _ => None,
    })
    .context("Daemon refused to shut down")?;

    println!("Daemon stopping");
    Ok(())
}

fn init_logger() {
    // Quiet by default so command output stays readable
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.cmd {
        Cmd::Set {
            key,
            value,
            minutes,
        } => cmd_set(&config, key, value, minutes),
        Cmd::List { json } => cmd_list(&config, json),
        Cmd::Clear { yes } => cmd_clear(&config, yes),
        Cmd::Test => cmd_test(&config),
        Cmd::DaemonStop => cmd_daemon_stop(&config),
    }
}
