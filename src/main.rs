use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thermostt::{CliOverrides, Session, SessionOptions, Settings};

#[derive(Parser, Debug)]
#[command(name = "thermostt")]
#[command(about = "Hysteresis thermostat controller driven by MQTT telemetry")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// MQTT broker host
    #[arg(short, long)]
    server: Option<String>,

    /// MQTT broker port [default: 1883]
    #[arg(short, long)]
    port: Option<u16>,

    /// Controller name, used for the threshold, liveness and state topics
    #[arg(short, long)]
    name: Option<String>,

    /// Name of the controlled load
    #[arg(short, long)]
    load: Option<String>,

    /// Id of the temperature sensor
    #[arg(long)]
    sensor: Option<String>,

    /// Calibration offset added to every sensor reading
    #[arg(long, allow_negative_numbers = true)]
    sensor_delta: Option<f64>,

    /// Topic for state snapshots [default: tele/<name>/STATE]
    #[arg(long)]
    state_topic: Option<String>,

    /// Topic for liveness [default: tele/<name>/LWT]
    #[arg(long)]
    lwt_topic: Option<String>,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            server: self.server.clone(),
            port: self.port,
            name: self.name.clone(),
            load: self.load.clone(),
            sensor: self.sensor.clone(),
            sensor_delta: self.sensor_delta,
            state_topic: self.state_topic.clone(),
            lwt_topic: self.lwt_topic.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.directive().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("{} {} started", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(args.config.as_deref(), &args.overrides())?;
    let controller = settings.build_controller()?;
    settings.log_summary(&controller);

    let options = SessionOptions::from_settings(&settings)?;
    Session::new(controller, &options).run().await
}
