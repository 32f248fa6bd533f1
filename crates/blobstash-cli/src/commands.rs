//! Command handlers. Each one maps to a screen of the mobile/web clients.

use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use blobstash_core::{ApiError, Config, Session, StoredRecord};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cli::{Cli, Command, ListArgs, LoginArgs, RegisterArgs, SaveArgs};

/// Width of the payload column in `list` output
const PAYLOAD_COLUMN_WIDTH: usize = 60;

const NOT_LOGGED_IN: &str = "Not logged in. Run `blobstash login` first.";

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    debug!(base_url = config.base_url(), storage = %config.token_storage, "Config loaded");

    let session = Session::open(&config)?;

    match cli.command {
        Command::Register(args) => register(&session, args).await,
        Command::Login(args) => login(&session, &mut config, args).await,
        Command::Logout => logout(&session).await,
        Command::Save(args) => save(&session, args).await,
        Command::List(args) => list(&session, args).await,
        Command::Status => status(&session, &config),
    }
}

async fn register(session: &Session, args: RegisterArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let user = session.register(&args.email, &password).await?;
    let email = user.and_then(|u| u.email).unwrap_or(args.email);
    println!("Registered {}. Run `blobstash login` to sign in.", email);
    Ok(())
}

async fn login(session: &Session, config: &mut Config, args: LoginArgs) -> Result<()> {
    let email = match args.email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt_email()?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt_password()?,
    };

    session.login(&email, &password).await?;

    config.last_email = Some(email.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {}.", email);
    Ok(())
}

async fn logout(session: &Session) -> Result<()> {
    if !session.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }

    let outcome = session.logout().await?;
    match outcome.remote_error {
        None => println!("Logged out."),
        Some(e) => println!("Logged out locally (server logout failed: {}).", e),
    }
    Ok(())
}

async fn save(session: &Session, args: SaveArgs) -> Result<()> {
    if !session.is_authenticated() {
        anyhow::bail!(NOT_LOGGED_IN);
    }

    let raw = match (args.json, args.file) {
        (Some(json), _) if json == "-" => read_stdin()?,
        (Some(json), _) => json,
        (None, Some(path)) => read_file(&path)?,
        (None, None) => anyhow::bail!("Provide a JSON document, `-`, or --file"),
    };
    let payload = parse_payload(&raw)?;
    let timestamp = args.timestamp.map(|ts| validate_timestamp(&ts)).transpose()?;

    let record = session.save_record(payload, timestamp).await?;
    println!("Saved record #{} at {}.", record.id, format_timestamp(&record));
    Ok(())
}

async fn list(session: &Session, args: ListArgs) -> Result<()> {
    if !session.is_authenticated() {
        anyhow::bail!(NOT_LOGGED_IN);
    }

    let records = session.list_records().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records yet. Save one with `blobstash save`.");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in render_table(&records) {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

fn status(session: &Session, config: &Config) -> Result<()> {
    println!("API:      {}", session.api().base_url());
    println!("Storage:  {}", config.token_storage);
    if session.is_authenticated() {
        match config.last_email {
            Some(ref email) => println!("Session:  logged in ({})", email),
            None => println!("Session:  logged in"),
        }
    } else {
        println!("Session:  not logged in");
    }
    Ok(())
}

// ===== Helpers =====

/// User-facing text for a failed command.
pub fn describe_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ApiError>() {
        Some(api) if api.is_unauthorized() => {
            format!("{}\nSession expired. Please log in again.", api)
        }
        Some(api) if matches!(api, ApiError::AuthContract(_)) => {
            format!("{}\nThe server's login response was not understood.", api)
        }
        _ => format!("{:#}", error),
    }
}

fn parse_payload(raw: &str) -> Result<Value> {
    serde_json::from_str(raw.trim()).context("Record is not valid JSON")
}

fn validate_timestamp(raw: &str) -> Result<String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|_| raw.to_string())
        .with_context(|| format!("Invalid timestamp '{}' (expected RFC 3339)", raw))
}

fn format_timestamp(record: &StoredRecord) -> String {
    record
        .created_at_utc()
        .map(|dt| dt.format("%b %d, %Y %H:%M UTC").to_string())
        .or_else(|| record.created_at.clone())
        .unwrap_or_else(|| "-".to_string())
}

fn render_table(records: &[StoredRecord]) -> Vec<String> {
    let id_width = records
        .iter()
        .map(|r| r.id.to_string().len())
        .max()
        .unwrap_or(1)
        .max(2);

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(format!("{:>id_width$}  {:<22}  {}", "ID", "SAVED", "DATA"));
    for record in records {
        lines.push(format!(
            "{:>id_width$}  {:<22}  {}",
            record.id,
            format_timestamp(record),
            record.payload_summary(PAYLOAD_COLUMN_WIDTH)
        ));
    }
    lines
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read record from stdin")?;
    Ok(buf)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }
    Ok(email)
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}
