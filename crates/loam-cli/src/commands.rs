use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use tokio::sync::Mutex;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use loam_config::{ConfigLoader, LoamConfig};
use loam_core::Plan;
use loam_executor::{MockExecutor, OpenAiExecutor, StepExecutor};
use loam_memory::{Experience, ExperienceMetrics, ExperienceStore};
use loam_planner::TemplatePlanner;
use loam_runtime::{AgentLoop, ExecutionStatus, LoopConfig, LoopState, SharedStore};
use loam_similarity::{OllamaEmbedding, OpenAiEmbedding, SimilarityEngine};

#[derive(Parser)]
#[command(name = "loam", version, about = "Experience-driven agent runner")]
pub struct Cli {
    /// Path to loam.toml (defaults to LOAM_CONFIG or ~/.loam/loam.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a goal through the agent loop
    Run {
        goal: String,
        /// Skip committing the run to memory
        #[arg(long)]
        no_store: bool,
    },
    /// Show experience-memory statistics
    Stats,
    /// Seed a canonical experience, then run the retrieval and the
    /// generation scenario back-to-back with the mock executor
    Demo,
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        let loader = ConfigLoader::load(self.config.as_deref())?;
        let config = loader.get();
        init_tracing(&config);

        match self.command {
            Command::Run { goal, no_store } => run_goal(&config, &goal, no_store).await,
            Command::Stats => show_stats(&config).await,
            Command::Demo => run_demo(&config).await,
        }
    }
}

fn init_tracing(config: &LoamConfig) {
    let filter = EnvFilter::try_from_env("LOAM_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_engine(config: &LoamConfig) -> SimilarityEngine {
    let engine = match config.memory.similarity_method.as_str() {
        "lexical" => SimilarityEngine::lexical(),
        // "auto" and "embedding" both get the capability when one can be built
        _ => match config.embedding.provider.as_str() {
            "ollama" => {
                let mut provider = OllamaEmbedding::new(&config.embedding.model)
                    .with_dimensions(config.embedding.dimensions);
                if let Some(url) = &config.embedding.base_url {
                    provider = provider.with_base_url(url.clone());
                }
                SimilarityEngine::with_embedding(Arc::new(provider))
            }
            _ => match &config.embedding.api_key {
                Some(key) => {
                    let mut provider = OpenAiEmbedding::new(key.clone())
                        .with_model(config.embedding.model.clone(), config.embedding.dimensions);
                    if let Some(url) = &config.embedding.base_url {
                        provider = provider.with_base_url(url.clone());
                    }
                    SimilarityEngine::with_embedding(Arc::new(provider))
                }
                None => {
                    warn!("no embedding api key available, similarity runs in lexical mode");
                    SimilarityEngine::lexical()
                }
            },
        },
    };
    engine.with_cache_capacity(config.memory.embedding_cache_size)
}

fn build_executor(config: &LoamConfig) -> Arc<dyn StepExecutor> {
    match config.executor.provider.as_str() {
        "openai" => {
            let key = config.executor.api_key.clone().unwrap_or_default();
            let mut executor = OpenAiExecutor::new(key)
                .with_model(config.executor.model.clone())
                .with_temperature(config.executor.temperature)
                .with_max_tokens(config.executor.max_tokens)
                .with_max_retries(config.executor.max_retries)
                .with_timeout(std::time::Duration::from_secs(config.executor.timeout_secs));
            if let Some(url) = &config.executor.base_url {
                executor = executor.with_base_url(url.clone());
            }
            Arc::new(executor)
        }
        _ => Arc::new(MockExecutor::new()),
    }
}

fn build_store(config: &LoamConfig) -> anyhow::Result<ExperienceStore> {
    let mut store = ExperienceStore::new(build_engine(config))
        .with_storage_threshold(config.memory.storage_threshold)?
        .with_retrieval_floor(config.memory.retrieval_floor)?
        .with_max_episodes(config.memory.max_episodes);

    if let Some(path) = &config.memory.snapshot_path {
        if path.exists() {
            store.load(path)?;
        }
    }
    Ok(store)
}

fn build_agent(config: &LoamConfig, store: SharedStore, record: bool) -> AgentLoop {
    AgentLoop::new(store, Arc::new(TemplatePlanner::new()), build_executor(config)).with_config(
        LoopConfig {
            max_recovery_attempts: config.agent.max_recovery_attempts,
            record_experience: record && config.agent.record_experience,
        },
    )
}

fn print_summary(state: &LoopState) {
    let status = match state.status {
        ExecutionStatus::Success => style("success").green().to_string(),
        ExecutionStatus::Failed => style("failed").red().to_string(),
        other => format!("{other:?}"),
    };
    println!();
    println!("{} {}", style("goal:").dim(), state.goal);
    println!("{} {}", style("status:").dim(), status);
    println!(
        "{} {}/{} completed, {} failed, {} recoveries",
        style("steps:").dim(),
        state.metrics.steps_completed,
        state.metrics.total_steps,
        state.metrics.steps_failed,
        state.metrics.recovery_attempts,
    );
    for entry in &state.error_log {
        println!("{} {}", style("error:").red(), entry);
    }
    if !state.last_output().is_empty() {
        println!("{} {}", style("output:").dim(), state.last_output());
    }
}

async fn run_goal(config: &LoamConfig, goal: &str, no_store: bool) -> anyhow::Result<()> {
    let store: SharedStore = Arc::new(Mutex::new(build_store(config)?));
    let agent = build_agent(config, store.clone(), !no_store);

    let state = agent.run(goal).await?;
    print_summary(&state);

    if let Some(path) = &config.memory.snapshot_path {
        store.lock().await.save(path)?;
    }
    Ok(())
}

async fn show_stats(config: &LoamConfig) -> anyhow::Result<()> {
    let store = build_store(config)?;
    let stats = store.statistics();

    println!("{}", style("experience memory").bold());
    println!("  experiences:   {}", stats.count);
    println!("  mean pei:      {:.3}", stats.mean_pei);
    println!("  min / max pei: {:.3} / {:.3}", stats.min_pei, stats.max_pei);
    println!("  stddev pei:    {:.3}", stats.stddev_pei);
    println!("  success rate:  {:.1}%", stats.success_rate * 100.0);
    println!("  semantic mode: {}", stats.semantic_mode);
    println!("  cache size:    {}", stats.cache_size);
    if let Some(oldest) = stats.oldest {
        println!("  oldest:        {oldest}");
    }
    if let Some(newest) = stats.newest {
        println!("  newest:        {newest}");
    }
    Ok(())
}

async fn run_demo(config: &LoamConfig) -> anyhow::Result<()> {
    // The demo always runs offline against the mock executor.
    let mut demo_config = config.clone();
    demo_config.executor.provider = "mock".into();
    demo_config.memory.snapshot_path = None;

    let store: SharedStore = Arc::new(Mutex::new(build_store(&demo_config)?));

    // Seed one high-quality experience for the retrieval scenario
    let seed_plan = Plan::new(
        "Optimize General Operations",
        vec![
            "Analyze current operational metrics".into(),
            "Identify optimization opportunities".into(),
            "Execute optimization algorithms".into(),
            "Validate improvements".into(),
        ],
    )
    .with_minimum_length(4);
    let seed = Experience::new(
        "Optimize General Operations",
        seed_plan,
        "Success",
        ExperienceMetrics::new(0.95)?.with_frr(1.0)?.with_ti(1.0)?,
    );
    store.lock().await.store(seed).await?;
    println!("{}", style("seeded 1 experience (PEI 0.95)").dim());

    let agent = build_agent(&demo_config, store.clone(), true);

    println!("\n{}", style("demo 1: goal matches stored experience").bold());
    let state = agent.run("Optimize General Operations").await?;
    print_summary(&state);

    println!("\n{}", style("demo 2: goal requires a fresh plan").bold());
    let state = agent.run("Improve Inventory Management Efficiency").await?;
    print_summary(&state);

    let stats = store.lock().await.statistics();
    println!(
        "\n{} {} experiences, mean PEI {:.2}",
        style("memory:").bold(),
        stats.count,
        stats.mean_pei
    );
    Ok(())
}
