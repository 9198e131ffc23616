//
// bngblasterd: the daemon binary. Parses arguments, loads and validates the
// configuration file, sets up logging, and runs the cooperative
// single-threaded event loop that drives `bbl_engine::Context` and serves
// the JSON control socket.
//
// Raw packet I/O backends aren't implemented in the core engine - `Context`
// only ever talks to its interfaces through the in-memory `LoopbackPort`,
// so this binary's job stops at time-keeping and control socket plumbing.
// It does not open a NIC.
//

use std::fs;
use std::os::unix::io::AsRawFd;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use bbl_engine::{ctrl, Context};
use bbl_utils::config::Config;

/// Interval the event loop drains interfaces and drives timers at. BNG
/// Blaster's own default scheduling quantum; the control socket is polled
/// on the same cadence via `config.control_socket.accept_poll_interval`.
const TICK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "bngblasterd", version, about = "BNG access emulator / traffic generator daemon")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "file")]
    config: String,

    /// Overrides the control socket path from the configuration file.
    #[arg(long, value_name = "path")]
    control_socket: Option<String>,

    /// Emit logs as JSON instead of the default compact text format.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("bngblasterd=info,bbl_engine=info".parse().unwrap())
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn load_config(path: &str) -> Result<Config, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}"))?;
    let mut config: Config =
        serde_json::from_str(&text).map_err(|e| format!("parsing {path}: {e}"))?;
    if config.interfaces.is_empty() {
        return Err("configuration defines no interfaces".into());
    }
    let mut ifindices = std::collections::HashSet::new();
    for iface in &config.interfaces {
        if !ifindices.insert(iface.ifindex) {
            return Err(format!("duplicate ifindex {}", iface.ifindex));
        }
    }
    config.interfaces.sort_by_key(|i| i.ifindex);
    Ok(config)
}

/// Handles one already-accepted connection end to end: one JSON request
/// line in, one JSON response line out, then the connection closes.
async fn handle_connection(stream: UnixStream, ctx: &mut Context, now: Instant) {
    bbl_engine::debug::Debug::ControlConnected(stream.as_raw_fd() as u32).log();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let request = match lines.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) => return,
        Err(e) => {
            warn!(%e, "control socket read failed");
            return;
        }
    };
    let response = ctrl::dispatch(ctx, &request, now);
    if let Err(e) = writer.write_all(response.as_bytes()).await {
        warn!(%e, "control socket write failed");
        return;
    }
    let _ = writer.write_all(b"\n").await;
    let _ = writer.shutdown().await;
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = match load_config(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = args.control_socket {
        config.control_socket.path = path;
    }

    let socket_path = config.control_socket.path.clone();
    let _ = fs::remove_file(&socket_path);
    let listener = match UnixListener::bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            error!(path = %socket_path, error = %e, "failed to create control socket");
            return ExitCode::FAILURE;
        }
    };
    info!(path = %socket_path, interfaces = config.interfaces.len(), "starting up");

    let started_at = Instant::now();
    let mut ctx = Context::new(Arc::new(config), started_at);

    let mut ticker = interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                ctx.isis_shutdown(Instant::now());
                break;
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                ctx.poll_interfaces(now);
                ctx.tick(now);
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => handle_connection(stream, &mut ctx, Instant::now()).await,
                    Err(e) => warn!(%e, "control socket accept failed"),
                }
            }
        }
    }

    let _ = fs::remove_file(&socket_path);
    debug!(uptime_secs = started_at.elapsed().as_secs(), "shutting down");
    ExitCode::SUCCESS
}
