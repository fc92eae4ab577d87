//! lirc-relay - lircd press/hold relay
//!
//! Entry point for the daemon binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use lirc_relay::{Config, Relay};

/// Command-line arguments for lirc-relay
#[derive(Parser, Debug)]
#[command(name = "lirc-relay")]
#[command(
    version,
    about = "Coalesces lircd key repeats and relays them to local clients",
    long_about = None
)]
pub struct Args {
    /// Upstream lircd socket
    #[arg(short, long, env = "LIRC_RELAY_INPUT", default_value = "/var/run/lirc/lircd")]
    pub input: PathBuf,

    /// Socket to serve consumers on (replaced if it exists)
    #[arg(short, long, env = "LIRC_RELAY_OUTPUT", default_value = "/var/run/lirc/lircd1")]
    pub output: PathBuf,

    /// Quiet period after the last repeat, in milliseconds
    #[arg(long, env = "LIRC_RELAY_QUIET_MS", default_value_t = 100)]
    pub quiet_ms: u64,

    /// Time since the first press after which a key counts as held, in milliseconds
    #[arg(long, env = "LIRC_RELAY_HOLD_MS", default_value_t = 500)]
    pub hold_ms: u64,

    /// Budget for handing a line to one client, in milliseconds
    #[arg(long, env = "LIRC_RELAY_WRITE_TIMEOUT_MS", default_value_t = 20)]
    pub write_timeout_ms: u64,

    /// Capacity of every internal queue
    #[arg(long, env = "LIRC_RELAY_QUEUE", default_value_t = 2)]
    pub queue: usize,

    /// Shutdown grace period, in milliseconds
    #[arg(long, env = "LIRC_RELAY_GRACE_MS", default_value_t = 1000)]
    pub grace_ms: u64,

    /// Octal mode for the output socket
    #[arg(long, env = "LIRC_RELAY_SOCKET_MODE", default_value = "666", value_parser = parse_mode)]
    pub socket_mode: u32,

    /// Owner for the output socket, as UID:GID (e.g. 0:0)
    #[arg(long, env = "LIRC_RELAY_SOCKET_OWNER", value_parser = parse_owner)]
    pub socket_owner: Option<(u32, u32)>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (pretty|compact|json)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Args {
    fn to_config(&self) -> Config {
        Config {
            input_path: self.input.clone(),
            output_path: self.output.clone(),
            quiet_period: Duration::from_millis(self.quiet_ms),
            hold_threshold: Duration::from_millis(self.hold_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            queue_capacity: self.queue,
            grace: Duration::from_millis(self.grace_ms),
            socket_mode: self.socket_mode,
            socket_owner: self.socket_owner,
            ..Config::default()
        }
    }
}

fn parse_mode(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0o"), 8)
        .map_err(|e| format!("invalid mode {s:?}: {e}"))
}

fn parse_owner(s: &str) -> Result<(u32, u32), String> {
    let (uid, gid) = s
        .split_once(':')
        .ok_or_else(|| format!("expected UID:GID, got {s:?}"))?;
    let uid = uid.parse().map_err(|e| format!("invalid uid {uid:?}: {e}"))?;
    let gid = gid.parse().map_err(|e| format!("invalid gid {gid:?}: {e}"))?;
    Ok((uid, gid))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("can't initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(args.to_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!("Starting lirc relay v{}", env!("CARGO_PKG_VERSION"));
    info!(
        quiet = ?cfg.quiet_period,
        hold = ?cfg.hold_threshold,
        write_timeout = ?cfg.write_timeout,
        queue = cfg.queue_capacity_clamped(),
        "Coalescing settings"
    );

    let upstream = Relay::connect(&cfg).await.context("upstream")?;
    let relay = Relay::bind(cfg).context("downstream socket")?;

    match relay.run_until_signal(upstream).await {
        Ok(()) => Ok(()),
        Err(e) if !e.is_fatal() => {
            warn!(label = e.as_label(), "{e}");
            Ok(())
        }
        Err(e) => Err(e).context("relay stopped"),
    }
}

/// Initialize tracing; `RUST_LOG` takes precedence over `-v`.
fn init_logging(args: &Args) -> Result<()> {
    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("lirc_relay={log_level},warn"))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false);
    let res = match args.log_format.as_str() {
        "json" => builder.json().try_init(),
        "compact" => builder.compact().try_init(),
        _ => builder.try_init(),
    };
    res.map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_onto_config() {
        let args = Args::parse_from([
            "lirc-relay",
            "--input",
            "/tmp/in",
            "--hold-ms",
            "400",
            "--socket-mode",
            "0o660",
            "--socket-owner",
            "0:20",
        ]);
        let cfg = args.to_config();
        assert_eq!(cfg.input_path, PathBuf::from("/tmp/in"));
        assert_eq!(cfg.hold_threshold, Duration::from_millis(400));
        assert_eq!(cfg.quiet_period, Duration::from_millis(100));
        assert_eq!(cfg.socket_mode, 0o660);
        assert_eq!(cfg.socket_owner, Some((0, 20)));
        assert_eq!(cfg.delimiter, "\n");
    }

    #[test]
    fn test_owner_requires_both_ids() {
        assert!(parse_owner("0").is_err());
        assert!(parse_owner("a:0").is_err());
        assert_eq!(parse_owner("1000:1000"), Ok((1000, 1000)));
    }
}
