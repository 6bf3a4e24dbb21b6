use std::env;
use std::error::Error;
use std::time::{Duration, Instant};

use log::{error, info};

use gyrochart::config::ConfigManager;
use gyrochart::source::{location_from_config, source_from_config};
use gyrochart::{app, logger, AppConfig, ChartSession};

const DEFAULT_CONFIG_PATH: &str = "gyrochart.toml";
const DEFAULT_HEADLESS_FRAMES: usize = 20;

struct Args {
    headless: bool,
    frames: usize,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        headless: false,
        frames: DEFAULT_HEADLESS_FRAMES,
    };

    for arg in env::args().skip(1) {
        if arg == "--headless" {
            args.headless = true;
        } else if let Some(value) = arg.strip_prefix("--frames=") {
            args.frames = value
                .parse()
                .map_err(|e| format!("invalid --frames value '{}': {}", value, e))?;
        } else {
            return Err(format!("unknown argument '{}'", arg));
        }
    }
    Ok(args)
}

fn main() {
    logger::init_logger("info");
    info!("Application starting");

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;

    let config_path = env::var("GYROCHART_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let manager = ConfigManager::load_or_default(&config_path)?;
    match manager.config_path() {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration at {}, using defaults", config_path),
    }
    let config = manager.get_config().clone();

    let runtime = tokio::runtime::Runtime::new()?;
    let mut source = source_from_config(&config.source);
    let location = location_from_config(&config);
    let session = ChartSession::start(source.as_mut(), location, &config, runtime.handle())?;

    if args.headless {
        run_headless(session, &config, args.frames)?;
    } else {
        app::run(session, &config)?;
    }

    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("Application exiting");
    Ok(())
}

/// Prints one snapshot per refresh interval as a JSON line.
fn run_headless(mut session: ChartSession, config: &AppConfig, frames: usize) -> Result<(), Box<dyn Error>> {
    let refresh = Duration::from_millis(config.window.refresh_interval_ms);

    for _ in 0..frames {
        let started = Instant::now();
        session.wait_and_pump(refresh);
        std::thread::sleep(refresh.saturating_sub(started.elapsed()));
        session.pump();
        println!("{}", session.snapshot().to_json()?);
    }

    if let Some(message) = session.status_message() {
        info!("{}", message);
    }
    session.end();
    Ok(())
}
