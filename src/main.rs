use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fair_tenant::config::Config;
use fair_tenant::config_validator::ConfigValidator;
use fair_tenant::{
    Job, JobType, JobTypeRegistry, MemoryWindowStore, RedisWindowStore, Routing, ThrottleMiddleware,
    ThrottleRule, WindowStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "fair-tenant", version, about = "Per-tenant job queue throttling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit jobs for one tenant through the middleware and print their queues
    Simulate {
        /// JSON file with an ordered list of rules
        #[arg(long)]
        rules: PathBuf,
        #[arg(long, default_value = "SimulatedJob")]
        job_type: String,
        #[arg(long, default_value = "default")]
        queue: String,
        #[arg(long)]
        tenant: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Use an in-process store instead of Redis
        #[arg(long)]
        memory: bool,
    },
    /// Check that Redis is reachable
    Ping,
    /// Validate environment configuration and, optionally, a rules file
    CheckConfig {
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn load_rules(path: &Path) -> Result<Vec<ThrottleRule>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules file {}", path.display()))?;
    let rules: Vec<ThrottleRule> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse rules file {}", path.display()))?;
    ConfigValidator::validate_rules(&rules)?;
    Ok(rules)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("fair_tenant={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Simulate {
            rules,
            job_type,
            queue,
            tenant,
            count,
            memory,
        } => {
            let rules = load_rules(&rules)?;

            let store: Arc<dyn WindowStore> = if memory {
                Arc::new(MemoryWindowStore::new())
            } else {
                ConfigValidator::validate_redis_url(&config.redis_url)?;
                Arc::new(RedisWindowStore::connect(&config.redis_url).await?)
            };

            let mut registry = JobTypeRegistry::new();
            registry.register(JobType::new(job_type.clone()).queue(queue.clone()).with_rules(rules));
            let middleware = ThrottleMiddleware::new(&config, store, Arc::new(registry))?;

            tracing::info!(
                job_type = %job_type,
                tenant = %tenant,
                count,
                max_window_secs = middleware.max_window().as_secs(),
                "Simulating submissions"
            );

            for n in 1..=count {
                let mut job = Job::new(job_type.clone(), queue.clone(), vec![]).with_tenant(tenant.clone());
                let routing = middleware.route(&mut job).await?;
                let note = match routing {
                    Routing::Assigned { rerouted: true, .. } => "rerouted",
                    Routing::Assigned { rerouted: false, .. } => "kept",
                    Routing::AlreadyRouted { .. } => "already routed",
                    Routing::NoTenant => "no tenant",
                    Routing::Disabled => "disabled",
                };
                println!("{:>4}  {}  ({})", n, job.queue, note);
            }
        }
        Command::Ping => {
            ConfigValidator::validate_redis_url(&config.redis_url)?;
            let store = RedisWindowStore::connect(&config.redis_url).await?;
            let reply = store.ping().await?;
            println!("{}: {}", config.redis_url, reply);
        }
        Command::CheckConfig { rules } => {
            ConfigValidator::validate_config(&config)?;
            println!("configuration ok: {}", serde_json::to_string_pretty(&config)?);

            if let Some(path) = rules {
                let rules = load_rules(&path)?;
                let max_window = config.max_throttling_window();
                for rule in rules.iter().filter(|r| r.window(max_window) > max_window) {
                    tracing::warn!(
                        queue = %rule.queue,
                        "Rule window exceeds the max throttling window and will undercount"
                    );
                }
                println!("{} rule(s) ok", rules.len());
            }
        }
    }

    Ok(())
}
