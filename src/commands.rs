//! `$`-prefixed chat commands: parsing and execution against the service.

use std::str::FromStr;

use tracing::{error, info};

use crate::error::{AppError, CommandError, EngineError, Result};
use crate::fetcher::Fetcher;
use crate::notify::{format, Notifier};
use crate::service::AlertService;
use crate::store::StateStore;

pub const COMMAND_PREFIX: char = '$';

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `$contract <cycles>`
    Contract(i64),
    Status,
    Clear,
    /// `$threshold <price>`
    Threshold(f64),
    /// `$interval <minutes>`
    Interval(i64),
    Help,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let body = s
            .trim()
            .strip_prefix(COMMAND_PREFIX)
            .ok_or(CommandError::NotACommand)?;
        let mut parts = body.split_whitespace();
        let name = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next();

        match name.as_str() {
            "contract" => Ok(Command::Contract(parse_arg(arg, "cycles")?)),
            "status" => Ok(Command::Status),
            "clear" => Ok(Command::Clear),
            "threshold" => Ok(Command::Threshold(parse_arg(arg, "price")?)),
            "interval" => Ok(Command::Interval(parse_arg(arg, "minutes")?)),
            "help" => Ok(Command::Help),
            _ => Err(CommandError::Unknown(format!("{COMMAND_PREFIX}{name}"))),
        }
    }
}

fn parse_arg<T: FromStr>(
    raw: Option<&str>,
    label: &'static str,
) -> std::result::Result<T, CommandError> {
    let raw = raw.ok_or(CommandError::MissingArgument(label))?;
    raw.parse()
        .map_err(|_| CommandError::BadArgument(raw.to_string()))
}

/// Run a command and return the reply text.
pub async fn execute<F, S, N>(service: &AlertService<F, S, N>, command: Command) -> Result<String>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    info!(?command, "Executing command");
    let reply = match command {
        Command::Contract(cycles) => {
            let receipt = service.register_contract(cycles).await?;
            format::contract_registered(receipt.current_cycle, receipt.end_cycle, receipt.cycles)
        }
        Command::Status => format::status_text(&service.status().await?),
        Command::Clear => format::contract_cleared(service.clear_contract().await?),
        Command::Threshold(value) => format::threshold_updated(service.set_threshold(value).await?),
        Command::Interval(minutes) => {
            let change = service.set_interval(minutes).await?;
            format::interval_updated(change.minutes, change.long_interval)
        }
        Command::Help => format::help_text().to_string(),
    };
    Ok(reply)
}

/// Parse and run raw chat text, turning every failure into a user-facing reply.
pub async fn handle_text<F, S, N>(service: &AlertService<F, S, N>, text: &str) -> String
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    let result = match text.parse::<Command>() {
        Ok(command) => execute(service, command).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(reply) => reply,
        Err(e) => error_reply(&e),
    }
}

pub fn error_reply(err: &AppError) -> String {
    match err {
        AppError::Engine(EngineError::InvalidArgument(msg)) => format!("❌ {}.", capitalize(msg)),
        AppError::Command(e) => format!("❌ {e}"),
        AppError::Fetch(_) => {
            "❌ Failed to fetch current oil price data. Please try again later.".to_string()
        }
        other => {
            error!("Command failed: {other}");
            "❌ An error occurred while processing the command.".to_string()
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
