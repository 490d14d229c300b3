use clap::Parser;
use log_tail::{PartialLines, Tail, TailConfig, TailEvent};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Print every line appended to a file, following truncation and rotation.
#[derive(Parser, Debug)]
#[command(name = "log-tail", version)]
struct Cli {
    /// File to follow. It does not need to exist yet.
    file: PathBuf,

    /// TOML configuration file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Encoding label, e.g. utf-8, latin1, utf-16le.
    #[arg(short, long)]
    encoding: Option<String>,

    /// Quiet period before a burst of writes is reported, in milliseconds.
    #[arg(long)]
    quiet_period_ms: Option<u64>,

    /// How often the quiet period is checked, in milliseconds.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Print the file's existing content before following it.
    #[arg(long)]
    from_start: bool,

    /// Drop a trailing line fragment instead of waiting for the rest of it.
    #[arg(long)]
    discard_partial: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn tail_config(&self) -> log_tail::Result<TailConfig> {
        let mut config = match &self.config {
            Some(path) => TailConfig::from_file(path)?,
            None => TailConfig::default(),
        };

        if let Some(encoding) = &self.encoding {
            config.encoding = encoding.clone();
        }
        if let Some(quiet_period_ms) = self.quiet_period_ms {
            config.watch.quiet_period_ms = quiet_period_ms;
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.watch.poll_interval_ms = poll_interval_ms;
        }
        if self.from_start {
            config.watch.ignore_initial = false;
        }
        if self.discard_partial {
            config.partial_lines = PartialLines::Discard;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match cli.tail_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(2);
        }
    };

    let (tail, mut lines) = match Tail::new(&cli.file, config).await {
        Ok(session) => session,
        Err(e) => {
            error!("Error setting up file watcher: {}", e);
            process::exit(1);
        }
    };
    info!(file = %cli.file.display(), "Watching file");

    loop {
        tokio::select! {
            event = lines.recv() => match event {
                Some(TailEvent::Line(line)) => println!("{}", line),
                Some(TailEvent::Error(e)) => warn!("{}", e),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tail.stop_watching();
                break;
            }
        }
    }
}
