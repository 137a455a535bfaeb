//! swarm demo: a pulsing cell grid and debris bursts, each drawn from one
//! windowed instance buffer.
//!
//! ```text
//! swarm-demo [--config PATH] [--headless [FRAMES]]
//! ```

mod app;
mod config;
mod headless;
mod producers;
mod swarm;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use winit::dpi::LogicalSize;

use swarm_engine::device::GpuInit;
use swarm_engine::logging::{LoggingConfig, init_logging};
use swarm_engine::window::{Runtime, RuntimeConfig};

use crate::app::SwarmApp;
use crate::config::DemoConfig;

#[derive(Debug, Default, PartialEq, Parser)]
#[command(name = "swarm-demo", version, about = "Windowed instance-buffer demo")]
struct Args {
    /// TOML config file (defaults to ./swarm.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run without a window for FRAMES fixed steps
    #[arg(long, value_name = "FRAMES", num_args = 0..=1, default_missing_value = "600")]
    headless: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = DemoConfig::load(args.config.as_deref())?;

    init_logging(LoggingConfig {
        env_filter: config.log_filter.clone(),
        ..LoggingConfig::default()
    });

    if let Some(frames) = args.headless {
        log::info!("headless run: {frames} frames");
        return headless::run(&config, frames);
    }

    let runtime = RuntimeConfig {
        title: config.window.title.clone(),
        initial_size: LogicalSize::new(config.window.width, config.window.height),
    };
    Runtime::run(runtime, GpuInit::default(), SwarmApp::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_HEADLESS_FRAMES: u64 = 600;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("swarm-demo").chain(args.iter().copied()))
    }

    #[test]
    fn no_args_opens_a_window() {
        assert_eq!(parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn headless_frame_count_is_optional() {
        assert_eq!(parse(&["--headless"]).unwrap().headless, Some(DEFAULT_HEADLESS_FRAMES));
        assert_eq!(parse(&["--headless", "42"]).unwrap().headless, Some(42));
    }

    #[test]
    fn headless_does_not_swallow_flags() {
        let args = parse(&["--headless", "--config", "a.toml"]).unwrap();
        assert_eq!(args.headless, Some(DEFAULT_HEADLESS_FRAMES));
        assert_eq!(args.config, Some(PathBuf::from("a.toml")));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--fast"]).is_err());
        assert!(parse(&["--headless", "many"]).is_err());
    }

    #[test]
    fn help_prints_usage() {
        let err = parse(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(err.to_string().contains("--headless"));
    }


    #[test]
    fn headless_run_shuts_down_cleanly() {
        let mut config = DemoConfig::default();
        config.grid.columns = 40;
        config.grid.rows = 40;
        config.bursts.max_fragments = 2_000;
        assert!(headless::run(&config, 120).is_ok());
    }
}
