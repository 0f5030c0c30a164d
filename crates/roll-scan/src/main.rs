//! `server`: the Roll attendance service.
//!
//! Settings come from an optional TOML file (`--config`, default
//! `config.toml`) overlaid by `ROLL_<KEY>` environment variables. Run with
//! `--hash-password` to produce a value for `auth_password_hash`.

use std::path::PathBuf;

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use roll_scan::{AppState, ServerConfig};
use roll_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Roll attendance scan server")]
struct Cli {
  /// TOML configuration file; missing is fine.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Hash a password read from stdin, print the PHC string and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  if cli.hash_password {
    println!("{}", hash_stdin_password()?);
    return Ok(());
  }

  let cfg = load_config(cli.config)?;
  serve(cfg).await
}

fn load_config(path: PathBuf) -> anyhow::Result<ServerConfig> {
  config::Config::builder()
    .set_default("host", "0.0.0.0")?
    .set_default("port", 8080)?
    .set_default("store_path", "roll.db")?
    .set_default("late_after_minutes", 10)?
    .set_default("store_timeout_ms", 5_000)?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("ROLL").try_parsing(true))
    .build()
    .context("failed to read configuration")?
    .try_deserialize()
    .context("invalid configuration")
}

async fn serve(cfg: ServerConfig) -> anyhow::Result<()> {
  let store_path = home_relative(cfg.store_path.clone());
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {}", store_path.display()))?
    .with_timeout(cfg.store_timeout());

  if cfg.auth().is_none() {
    tracing::warn!("auth_username/auth_password_hash unset, admin API disabled");
  }
  tracing::info!(
    late_after_minutes = cfg.late_after_minutes,
    store = %store_path.display(),
    "store ready"
  );

  let address = format!("{}:{}", cfg.host, cfg.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("listening on http://{address}");

  axum::serve(listener, roll_scan::router(AppState::new(store, cfg)))
    .await
    .context("server error")
}

fn hash_stdin_password() -> anyhow::Result<String> {
  let mut line = String::new();
  std::io::stdin().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']);
  anyhow::ensure!(!password.is_empty(), "empty password on stdin");

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
  Ok(hash.to_string())
}

/// `~/x` becomes `$HOME/x`.
fn home_relative(path: PathBuf) -> PathBuf {
  if let (Ok(rest), Some(home)) = (path.strip_prefix("~"), std::env::var_os("HOME")) {
    return PathBuf::from(home).join(rest);
  }
  path
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_config_file_falls_back_to_defaults() {
    let cfg = load_config(PathBuf::from("/nonexistent/roll-config.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.late_after_minutes, 10);
    assert_eq!(cfg.store_timeout_ms, 5_000);
    assert!(cfg.auth().is_none());
  }

  #[test]
  fn tilde_expands_to_home() {
    let Some(home) = std::env::var_os("HOME") else { return };
    assert_eq!(
      home_relative(PathBuf::from("~/roll/roll.db")),
      PathBuf::from(home).join("roll/roll.db")
    );
    assert_eq!(home_relative(PathBuf::from("/var/roll.db")), PathBuf::from("/var/roll.db"));
  }
}
