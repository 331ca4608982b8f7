// Hassanfy - one screen, one playlist, play/pause/skip and a scrub bar

use anyhow::Result;
use clap::Parser;
use hassanfy::{
    audio::{RodioEngine, TransportController},
    config::Config,
    ui::App,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "hassanfy")]
#[command(about = "A single-screen terminal music player")]
struct Args {
    /// Config file to use instead of the per-user one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the audio files of the playlist
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,
}

fn init_logging(log_dir: &Path, dev: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    // Daily rotating file appender; stdout belongs to the TUI
    let file_appender = tracing_appender::rolling::daily(log_dir, "hassanfy.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hassanfy=debug"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if dev {
        eprintln!("Dev mode: logging to stderr and {}", log_dir.display());
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(assets) = args.assets {
        config.asset_dir = assets;
    }

    // keep the guard alive so buffered log lines get flushed on exit
    let _log_guard = init_logging(&config.log_dir, args.dev)?;
    info!("Hassanfy starting up");

    // ALSA likes to chatter on stderr, which would tear the TUI apart
    if !args.dev {
        if let Err(e) = redirect_stderr_to_null() {
            warn!("Could not silence stderr: {}", e);
        }
    } else {
        debug!("Dev mode: keeping stderr for debug output");
    }

    let playlist = config.playlist()?;
    let engine = Arc::new(RodioEngine::new(&config.audio)?);
    let transport = TransportController::new(engine, playlist, config.audio.poll_interval());

    let mut app = App::new(config.ui.clone(), transport)?;
    app.run().await?;

    info!("Hassanfy shutting down");
    Ok(())
}

#[cfg(unix)]
fn redirect_stderr_to_null() -> Result<()> {
    // SAFETY: plain fd juggling on descriptors this process owns.
    unsafe {
        let null_fd = libc::open(b"/dev/null\0".as_ptr() as *const libc::c_char, libc::O_WRONLY);
        if null_fd == -1 {
            return Err(anyhow::anyhow!("Failed to open /dev/null"));
        }

        if libc::dup2(null_fd, libc::STDERR_FILENO) == -1 {
            libc::close(null_fd);
            return Err(anyhow::anyhow!("Failed to redirect stderr"));
        }

        libc::close(null_fd);
    }

    Ok(())
}

#[cfg(not(unix))]
fn redirect_stderr_to_null() -> Result<()> {
    Ok(())
}
