//! festive-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and either serves the JSON API or, with `--run`, performs a single
//! dispatch run and prints its stats. The one-shot mode is meant for a daily
//! cron entry; it exits non-zero on a fatal error.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `[auth] password_hash`:
//!
//! ```text
//! cargo run -p festive-server -- --hash-password
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use festive_server::{ServerConfig, build_state, run_once};
use rand_core::OsRng;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Festive greeting dispatcher")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Perform one dispatch run, print its stats as JSON, and exit.
  #[arg(long)]
  run: bool,

  /// Target date for `--run`, as MM-DD or YYYY-MM-DD. Defaults to today in
  /// the configured time zone.
  #[arg(long, requires = "run")]
  date: Option<String>,

  /// With `--run`, report what would be sent without sending or reserving.
  #[arg(long, requires = "run")]
  dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so `--run` output on stdout stays machine-readable.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = rpassword_or_stdin()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = ServerConfig::load(&cli.config)?;
  let state = build_state(&server_cfg).await?;

  if cli.run {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupt received, finishing in-flight sends");
        let _ = cancel_tx.send(true);
      }
    });

    let stats = run_once(
      &state,
      cli.date.as_deref(),
      cli.dry_run,
      server_cfg.ledger_retention_years,
      cancel_rx,
    )
    .await?;
    println!(
      "{}",
      serde_json::to_string_pretty(&stats).context("failed to encode run stats")?
    );
    return Ok(());
  }

  let app = festive_api::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
    })
    .await
    .context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
