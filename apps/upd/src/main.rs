//! upd - concurrent update orchestrator
//!
//! The CLI wires the configuration, subprocess host, sampler, and scheduler
//! together, renders the merged event stream, and maps the run
//! classification onto the process exit code.

mod cli;
mod events;
mod logging;

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use upd_config::Config;
use upd_errors::Error;
use upd_pipeline::{PipelineConfig, PipelineContext};
use upd_plugin::{estimate_update, refresh_descriptor, ProcfsSampler, SubprocessHost};
use upd_resources::ResourceRegistry;
use upd_scheduler::Scheduler;
use upd_types::RunClassification;

use crate::cli::{Cli, Commands};
use crate::events::EventRenderer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;
    init_tracing(json_mode, cli.global.debug);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("application error: {e}");
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(3);
        }
    }
}

/// Main application logic; returns the process exit code.
async fn run(cli: Cli) -> Result<i32, Error> {
    info!("starting upd v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;

    match cli.command {
        Commands::List => {
            list_plugins(&config, cli.global.json);
            Ok(0)
        }
        Commands::Probe { plugin } => probe_plugin(&config, &plugin, cli.global.json).await,
        Commands::Run {
            plugins,
            dry_run,
            max_concurrency,
        } => {
            if let Some(n) = max_concurrency {
                config.scheduler.max_concurrency = n.max(1);
            }
            run_pipelines(&config, &plugins, dry_run, cli.global.json, cli.global.debug).await
        }
    }
}

fn list_plugins(config: &Config, json: bool) {
    let descriptors = config.plugin_descriptors();
    if json {
        if let Ok(line) = serde_json::to_string_pretty(&descriptors) {
            println!("{line}");
        }
        return;
    }
    if descriptors.is_empty() {
        println!("no plugins configured");
        return;
    }
    for descriptor in descriptors {
        let phases: Vec<&str> = descriptor.phases.iter().map(|p| p.as_str()).collect();
        println!(
            "{}: phases [{}]{}{}",
            descriptor.name,
            phases.join(", "),
            if descriptor.requires_sudo { ", sudo" } else { "" },
            if descriptor.supports_dry_run {
                ", dry-run"
            } else {
                ""
            }
        );
    }
}

async fn probe_plugin(config: &Config, name: &str, json: bool) -> Result<i32, Error> {
    let Some(descriptor) = config
        .plugin_descriptors()
        .into_iter()
        .find(|d| d.name == name)
    else {
        eprintln!("plugin not configured: {name}");
        return Ok(3);
    };

    let host = build_host(config);
    let refreshed = refresh_descriptor(host.as_ref(), descriptor).await?;
    let estimate = estimate_update(host.as_ref(), &refreshed).await?;
    if json {
        let value = serde_json::json!({
            "descriptor": refreshed,
            "estimate": estimate,
        });
        if let Ok(line) = serde_json::to_string_pretty(&value) {
            println!("{line}");
        }
    } else {
        println!(
            "{}: requires_sudo={}, separate download={}",
            refreshed.name,
            refreshed.requires_sudo,
            refreshed.phases.contains(upd_types::Phase::Download)
        );
        if let Some(estimate) = estimate {
            if let Some(bytes) = estimate.download_bytes {
                println!("  estimated download: {bytes} bytes");
            }
            if let Some(seconds) = estimate.cpu_seconds {
                println!("  estimated cpu time: {seconds}s");
            }
        }
    }
    Ok(0)
}

async fn run_pipelines(
    config: &Config,
    filter: &[String],
    dry_run: bool,
    json: bool,
    debug: bool,
) -> Result<i32, Error> {
    let descriptors: Vec<_> = config
        .plugin_descriptors()
        .into_iter()
        .filter(|d| filter.is_empty() || filter.contains(&d.name))
        .collect();
    if descriptors.is_empty() {
        warn!("no plugins selected");
        if !json {
            println!("nothing to do: no plugins selected");
        }
        return Ok(0);
    }

    let ctx = PipelineContext {
        registry: Arc::new(ResourceRegistry::new()),
        host: build_host(config),
        sampler: Arc::new(ProcfsSampler::new()),
        config: PipelineConfig {
            acquire_timeout: config.acquire_timeout(),
            grace_period: config.grace_period(),
            sample_interval: config.sample_interval(),
            dry_run,
        },
    };
    let scheduler = Scheduler::new(ctx, config.scheduler.max_concurrency)
        .with_channel_capacity(config.streaming.channel_capacity);
    let mut handle = scheduler.start(descriptors);

    // First Ctrl-C cancels the run; pipelines then wind down through the
    // normal termination path and the report still gets rendered.
    let cancel = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested");
            cancel.cancel();
        }
    });

    let renderer = EventRenderer::new(json, debug);
    while let Some(envelope) = handle.events().recv().await {
        renderer.handle(&envelope);
    }
    let report = handle.join().await?;
    renderer.render_report(&report);

    Ok(match report.classification {
        RunClassification::Success => 0,
        RunClassification::PartialFailure => 1,
        RunClassification::TotalFailure => 2,
    })
}

fn build_host(config: &Config) -> Arc<SubprocessHost> {
    match &config.process.plugin_dir {
        Some(dir) => Arc::new(SubprocessHost::with_plugin_dir(dir)),
        None => Arc::new(SubprocessHost::new()),
    }
}

fn init_tracing(json_mode: bool, debug_enabled: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_enabled {
            tracing_subscriber::EnvFilter::new("info,upd=debug")
        } else {
            tracing_subscriber::EnvFilter::new("warn")
        }
    });

    if json_mode {
        // JSON mode owns stdout; keep log records on stderr as JSON lines.
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
}
