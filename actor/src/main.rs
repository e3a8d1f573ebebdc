//! Actor - Mirage self-play pipeline runner
//!
//! A long-running process that:
//! 1. Restores the newest checkpoint (or starts from an empty model)
//! 2. Runs N self-play workers searching with MCTS over the latest model
//! 3. Trains on the shared replay buffer and publishes new versions
//! 4. Writes `<data_dir>/actor_stats.json` and refreshes Prometheus gauges

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use actor::config::Config;
use actor::metrics;
use actor::pipeline::{Pipeline, PipelineConfig};
use actor::stats::ActorStats;
use actor::UniformNetworkFactory;
use engine_core::create_environment;
use model_store::{CheckpointStore, SharedStorage};
use trainer::PassthroughOptimizer;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

fn progress_bar(max_games: Option<u64>) -> Option<ProgressBar> {
    let max = max_games.filter(|&m| m > 0)?;
    if !std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        return None;
    }
    let pb = ProgressBar::new(max);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} games ({eta}) {msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => warn!(error = %e, "Invalid progress bar template"),
    }
    Some(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    eprintln!("Actor starting...");

    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");

    engine_games::register_all_games();
    metrics::init_metrics();
    metrics::set_actor_info(&config.env_id, &config.actor_id);

    let metadata = create_environment(&config.env_id)
        .map(|env| env.metadata())
        .ok_or_else(|| anyhow!("Unknown environment '{}'", config.env_id))?;
    info!(
        env_id = %metadata.env_id,
        actions = metadata.action_space_size,
        players = metadata.player_count,
        observation = ?metadata.observation_shape,
        "Environment resolved"
    );

    let checkpoint_dir = config.checkpoint_dir();
    let storage = match CheckpointStore::new(&checkpoint_dir, config.central.storage.max_checkpoints)
        .restore()
    {
        Ok(Some(storage)) => storage,
        Ok(None) => {
            info!("No checkpoint found, starting from an empty model");
            SharedStorage::new(Vec::<u8>::new())
        }
        Err(e) => {
            warn!(error = %e, dir = %checkpoint_dir.display(), "Checkpoint restore failed, starting fresh");
            SharedStorage::new(Vec::<u8>::new())
        }
    };
    let storage = Arc::new(storage);

    let stats = Arc::new(ActorStats::new(&config.data_dir, &config.env_id));
    let pipeline_config = PipelineConfig::from_cli(&config)?;
    let max_games = pipeline_config.max_games;
    info!(
        actor_id = %config.actor_id,
        workers = config.num_workers,
        max_games = ?max_games,
        "Starting actor"
    );

    let pipeline = Arc::new(
        Pipeline::new(
            pipeline_config,
            Arc::new(UniformNetworkFactory::new(metadata.action_space_size)),
            Arc::clone(&storage),
        )
        .with_stats(Arc::clone(&stats)),
    );

    // Graceful shutdown
    let shutdown = pipeline.shutdown_handle();
    let signal_handle = tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping actor...");
                shutdown.store(true, Ordering::SeqCst);
            }
            Err(e) => error!(error = %e, "Failed to listen for ctrl+c"),
        }
    });

    // Periodic stats file, gauges and progress
    let stats_handle = {
        let stats = Arc::clone(&stats);
        let replay = pipeline.replay();
        let storage = Arc::clone(&storage);
        let counters = pipeline.trainer_counters();
        let progress = progress_bar(max_games);
        let mut interval = tokio::time::interval(config.stats_interval());
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                stats.set_pipeline_status(
                    replay.size(),
                    storage.latest_version(),
                    storage.training_step(),
                );
                stats.write_stats();

                metrics::REPLAY_STEPS.set(replay.size() as i64);
                metrics::MODEL_VERSION.set(storage.latest_version() as i64);
                metrics::TRAINER_STEPS.set(counters.steps() as i64);
                metrics::TRAINER_UNDERFILL_SKIPS.set(counters.underfill_skips() as i64);
                metrics::TRAINER_FAILED_STEPS.set(counters.failed_steps() as i64);
                metrics::TRAINER_RESTARTS.set(counters.restarts() as i64);
                metrics::update_memory_metrics();

                if let Some(pb) = &progress {
                    pb.set_position(stats.games_completed());
                    pb.set_message(format!("v{}", storage.latest_version()));
                }
            }
        })
    };

    let runner = Arc::clone(&pipeline);
    let run_result = tokio::task::spawn_blocking(move || runner.run(PassthroughOptimizer::default()))
        .await
        .context("Pipeline task failed")?;

    signal_handle.abort();
    stats_handle.abort();
    stats.set_pipeline_status(
        pipeline.replay().size(),
        storage.latest_version(),
        storage.training_step(),
    );
    stats.write_stats();

    match run_result {
        Ok(report) => {
            for worker in report.workers.iter().filter(|w| w.error.is_some()) {
                warn!(worker = worker.worker_id, error = ?worker.error, "Worker stopped early");
            }
            if let Some(e) = &report.trainer.error {
                error!(error = %e, "Trainer failed");
                return Err(anyhow!("Trainer failed: {}", e));
            }
            info!(
                games = report.games,
                train_steps = report.trainer.steps,
                version = report.final_version,
                "Actor completed successfully"
            );
            Ok(())
        }
        Err(e) => {
            error!("Actor failed: {}", e);
            Err(e)
        }
    }
}
