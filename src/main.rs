//! lightctl — entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  MqttTransport / MqttEventLoop      Pca9685Pwm   CdevPin     │
//! │  (Transport, rumqttc)               (PwmPort)    (InputPin)  │
//! │                                                              │
//! │  ─────────────────── Port Trait Boundary ──────────────────  │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ Controller                                             │  │
//! │  │ CommandRouter · Lights · FadeEngine · PwmBus · PIR     │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Startup order: logging → config → PWM board → MQTT client →
//! devices → event loop. The main thread then parks until SIGINT or
//! SIGTERM and shuts everything down in reverse.
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tracing_subscriber::EnvFilter;

use lightctl::adapters::{hardware, mqtt};
use lightctl::app::router::CommandRouter;
use lightctl::app::service::Controller;
use lightctl::config::{self, SystemConfig};
use lightctl::drivers::pwm_bus::PwmBus;
use lightctl::sensors::POLL_INTERVAL;
use lightctl::shutdown::ShutdownSignal;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Also installs the `log` → `tracing` bridge.
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_logging();

    info!("╔══════════════════════════════════════╗");
    info!("║  lightctl v{:<26}║", env!("CARGO_PKG_VERSION"));
    info!("║  MQTT → PCA9685 light controller     ║");
    info!("╚══════════════════════════════════════╝");

    // ── Configuration ─────────────────────────────────────────
    let path = config::resolve_path(
        std::env::args().nth(1),
        std::env::var(config::CONFIG_ENV).ok(),
    );
    let config = SystemConfig::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    info!(
        "Configuration loaded from {} ({} devices)",
        path.display(),
        config.devices.len()
    );

    // ── Shutdown hook ─────────────────────────────────────────
    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.trigger()).context("installing signal handler")?;
    }

    // ── Hardware ──────────────────────────────────────────────
    let pwm = hardware::open_pwm(&config.pwm).context("initialising PCA9685")?;
    let bus = Arc::new(PwmBus::new(pwm));

    // ── Transport + devices ───────────────────────────────────
    let (transport, event_loop) = mqtt::connect(&config.mqtt);
    let router = Arc::new(CommandRouter::new(transport));

    let gpio = config.gpio.clone();
    let controller = Controller::build(
        &config,
        bus,
        Arc::clone(&router),
        |pir| hardware::open_pir_pin(&gpio, pir),
        POLL_INTERVAL,
    )
    .context("building devices")?;

    // Subscriptions are registered before the first CONNACK, so the
    // initial connect subscribes to every topic in one pass.
    let _event_thread = event_loop
        .spawn(Arc::clone(&router))
        .context("spawning MQTT event loop")?;

    info!("Running; press Ctrl-C to stop");
    shutdown.block();

    info!("Shutdown requested");
    controller.shutdown();
    Ok(())
}
