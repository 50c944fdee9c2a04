//! `raspbot-cli` – Raspbot control server
//!
//! This binary is the entry point for the robot. It:
//!
//! 1. Installs logging (and OTLP span export when configured).
//! 2. Loads `~/.raspbot/config.toml`, writing the defaults on first run.
//! 3. Builds the shared [`RobotContext`] around the configured drivers and
//!    puts the hardware in its safe state.
//! 4. Serves the cockpit until **Ctrl-C**, then stops every actuator before
//!    exiting.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use raspbot_cockpit::CockpitServer;
use raspbot_hal::{CameraDriver, SimCamera, SimGateway};
use raspbot_runtime::{RobotContext, init_tracing};
use raspbot_types::BotError;
use tracing::{error, info, warn};

use config::{CameraBackend, Config};

fn main() -> ExitCode {
    let _telemetry = init_tracing("raspbot");

    print_banner();

    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "configuration unusable");
            println!("{}: {e}", "Config error".red());
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg)) {
        Ok(()) => {
            println!("{}", "  ✓ Hardware stopped. Bye.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "server failed");
            println!("{}: {e}", "Server error".red());
            ExitCode::FAILURE
        }
    }
}

fn load_config() -> Result<Config, BotError> {
    let path = config::config_path();
    if !path.exists() {
        match config::save(&Config::default()) {
            Ok(()) => println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => warn!(error = %e, "could not write default config"),
        }
    } else {
        println!("  Config loaded from {}", path.display().to_string().bold());
    }
    config::load()
}

async fn serve(cfg: Config) -> Result<(), BotError> {
    tokio::fs::create_dir_all(&cfg.storage.save_dir).await?;

    warn!("no bus driver is linked into this build; using the simulated gateway");
    let ctx = RobotContext::new(
        Box::new(SimGateway::new()),
        camera_driver(&cfg),
        cfg.camera.capture_settings(),
        cfg.camera.pipeline_settings(),
        cfg.storage.save_dir.clone(),
    );

    if let Err(e) = ctx.enter_safe_state().await {
        warn!(error = %e, "startup safe state incomplete");
    }

    println!(
        "  Cockpit on {} (pictures in {})",
        format!("http://{}:{}", cfg.server.host, cfg.server.port).bold().cyan(),
        cfg.storage.save_dir.display()
    );

    let result = CockpitServer::new(ctx.clone())
        .with_host(cfg.server.host.clone())
        .with_port(cfg.server.port)
        .run(shutdown_signal())
        .await;

    ctx.shutdown().await;
    info!("hardware left in safe state");
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler unavailable; stop the process to exit");
        std::future::pending::<()>().await;
    }
    println!();
    println!("{}", "⚠  Ctrl-C received – stopping motors and shutting down …".yellow().bold());
}

fn camera_driver(cfg: &Config) -> Arc<dyn CameraDriver> {
    let cam = &cfg.camera;
    match cam.backend {
        CameraBackend::Sim => {
            info!(width = cam.width, height = cam.height, "using simulated camera");
            Arc::new(SimCamera::new(cam.width, cam.height))
        }
        #[cfg(feature = "v4l2")]
        CameraBackend::V4l2 => {
            info!(device = %cam.device, "using V4L2 camera");
            Arc::new(raspbot_hal::V4l2Camera::new(cam.device.clone()).with_resolution(cam.width, cam.height))
        }
        #[cfg(not(feature = "v4l2"))]
        CameraBackend::V4l2 => {
            warn!(device = %cam.device, "built without the v4l2 feature; using simulated camera");
            Arc::new(SimCamera::new(cam.width, cam.height))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___                 __        __ "#.bold().cyan());
    println!("{}", r#"  / _ \___ ____ ___  / /  ___  / /_"#.bold().cyan());
    println!("{}", r#" / , _/ _ `(_-</ _ \/ _ \/ _ \/ __/"#.bold().cyan());
    println!("{}", r#"/_/|_|\_,_/___/ .__/_.__/\___/\__/ "#.bold().cyan());
    println!("{}", r#"             /_/                    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Raspbot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Hardware-bus control server");
    println!();
}
