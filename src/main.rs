//! # TedClub
//!
//! Weekly TED talk club bot for a Telegram group.
//!
//! Usage:
//!   tedclub                       # Run scheduler + health server (same as `serve`)
//!   tedclub run propose           # Run one phase now
//!   tedclub run propose --topic Space
//!   tedclub status                # Show the current cycle and next runs
//!   tedclub check-config          # Validate configuration and exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use tedclub_channels::TelegramMessenger;
use tedclub_core::config::TedClubConfig;
use tedclub_core::traits::CycleStore;
use tedclub_providers::TedSearch;
use tedclub_scheduler::{ClockScheduler, SchedulerDb, TaskRegistry};
use tedclub_workflow::{Orchestrator, Phase, PhaseSchedule};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tedclub",
    version,
    about = "🎤 TedClub: propose, vote on and discuss a TED talk every week"
)]
struct Cli {
    /// Config file (default: ~/.tedclub/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the weekly scheduler and the health server
    Serve,
    /// Run a single phase immediately
    Run {
        /// propose, select or prepare
        phase: String,
        /// Topic to propose instead of a random one
        #[arg(long)]
        topic: Option<String>,
    },
    /// Show the current cycle, recent history and next runs
    Status {
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Validate configuration and exit
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<TedClubConfig> {
    let config = match path {
        Some(p) => {
            let mut config = TedClubConfig::load_from(p)
                .with_context(|| format!("loading {}", p.display()))?;
            config.apply_env();
            config
        }
        None => TedClubConfig::load()?,
    };
    Ok(config)
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("invalid timezone '{name}': {e}"))
}

struct App {
    orchestrator: Arc<Orchestrator>,
    store: Arc<SchedulerDb>,
    messenger: Arc<TelegramMessenger>,
}

/// Build real collaborators from config.
fn wire(config: &TedClubConfig) -> Result<App> {
    let db_path = config.store.resolved_path();
    let store = Arc::new(
        SchedulerDb::open(&db_path).with_context(|| format!("opening {}", db_path.display()))?,
    );
    let search = Arc::new(TedSearch::new(&config.ted)?);
    let generator: Arc<dyn tedclub_core::traits::TextGenerator> =
        Arc::from(tedclub_providers::create_generator(&config.llm)?);
    let messenger = Arc::new(TelegramMessenger::new(&config.telegram)?);

    tracing::info!(
        "🔌 Providers: search=ted, llm={} ({}), messenger=telegram, db={}",
        config.llm.provider,
        config.llm.model,
        db_path.display()
    );

    let orchestrator = Arc::new(Orchestrator::new(
        search,
        generator,
        messenger.clone(),
        store.clone(),
        config.workflow.clone(),
    ));
    Ok(App {
        orchestrator,
        store,
        messenger,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "tedclub=debug,tedclub_scheduler=debug,tedclub_workflow=debug,tedclub_providers=debug,tedclub_channels=debug,tedclub_gateway=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Run { phase, topic } => run_once(config, &phase, topic.as_deref()).await,
        Command::Status { limit } => status(&config, limit),
        Command::CheckConfig => check_config(&config),
    }
}

async fn serve(config: TedClubConfig) -> Result<()> {
    config.validate()?;
    let tz = parse_timezone(&config.schedule.timezone)?;
    let schedule = PhaseSchedule::from_config(&config.schedule)?;
    let app = wire(&config)?;

    let mut registry = TaskRegistry::new();
    tedclub_workflow::register_phases(&mut registry, app.orchestrator.clone(), &schedule)?;
    let scheduler = ClockScheduler::new(registry, tz)
        .with_tick(std::time::Duration::from_secs(config.schedule.tick_secs))
        .with_tolerance_minutes(config.schedule.tolerance_mins)
        .with_fire_log(app.store.clone());

    println!("🎤 TedClub v{}", env!("CARGO_PKG_VERSION"));
    println!("   Topics: {}", config.workflow.topics.join(", "));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("🛑 Shutdown requested");
                    cancel.cancel();
                }
                Err(e) => tracing::warn!("⚠️ Ctrl-C handler unavailable: {e}"),
            }
        });
    }

    let gateway = if config.gateway.enabled {
        let state = tedclub_gateway::AppState::new(app.store.clone(), app.messenger.clone())
            .with_schedule(
                &config.schedule.timezone,
                Phase::ALL
                    .iter()
                    .map(|p| (p.to_string(), schedule.slot(*p).to_string()))
                    .collect(),
            );
        let gateway_config = config.gateway.clone();
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = tedclub_gateway::start(&gateway_config, state, cancel.clone()).await {
                tracing::error!("❌ Gateway server failed: {e}");
                cancel.cancel();
            }
        }))
    } else {
        None
    };

    scheduler.run(cancel.clone()).await;

    if let Some(handle) = gateway {
        join_gateway(handle).await;
    }
    Ok(())
}

/// Wait for the gateway task and log how it ended. Returns `true` on a clean exit.
async fn join_gateway(handle: tokio::task::JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) if e.is_panic() => {
            tracing::error!("💥 Gateway task panicked: {e}");
            false
        }
        Err(e) => {
            tracing::warn!("⚠️ Gateway task aborted: {e}");
            false
        }
    }
}

async fn run_once(config: TedClubConfig, phase: &str, topic: Option<&str>) -> Result<()> {
    let phase: Phase = phase.parse()?;
    config.validate()?;
    let app = wire(&config)?;

    let result = match (phase, topic) {
        (Phase::Propose, Some(topic)) => app.orchestrator.propose_topic(topic).await.map(|_| ()),
        (_, Some(_)) => anyhow::bail!("--topic only applies to the propose phase"),
        (phase, None) => app.orchestrator.run_phase(phase).await,
    };
    match result {
        Ok(()) => {
            println!("✅ {phase} done");
            Ok(())
        }
        Err(e) if e.is_skip() => {
            println!("⏭️ {phase} skipped: {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn status(config: &TedClubConfig, limit: usize) -> Result<()> {
    let tz = parse_timezone(&config.schedule.timezone)?;
    let schedule = PhaseSchedule::from_config(&config.schedule)?;
    let store = SchedulerDb::open(&config.store.resolved_path())?;

    println!("🎤 TedClub status\n");
    match store.current_cycle()? {
        Some(cycle) => {
            println!(
                "Current cycle #{} ({}), topic '{}', started {}",
                cycle.id,
                cycle.state(),
                cycle.topic,
                cycle.started_at.with_timezone(&tz).format("%a %Y-%m-%d %H:%M")
            );
            for c in &cycle.candidates {
                let mark = if cycle.selected_candidate_id.as_deref() == Some(c.id.as_str()) {
                    "🏆"
                } else {
                    "  "
                };
                let votes = c.votes.map(|v| format!("{v} votes")).unwrap_or_default();
                println!("  {mark} {}. {} {}", c.poll_option + 1, c.title, votes);
            }
            if let Some(discussion) = &cycle.discussion {
                println!("\n  Discussion:");
                for line in discussion.lines() {
                    println!("   • {line}");
                }
            }
        }
        None => println!("No cycle yet."),
    }

    let history = store.recent_cycles(limit)?;
    if history.len() > 1 {
        println!("\nRecent:");
        for cycle in history.iter().skip(1) {
            let winner = cycle
                .selected_candidate()
                .map(|c| c.title.as_str())
                .unwrap_or("-");
            println!("  #{} {} [{}] {}", cycle.id, cycle.topic, cycle.state(), winner);
        }
    }

    let local = Utc::now().with_timezone(&tz).naive_local();
    println!("\nNext runs ({}):", tz);
    for phase in Phase::ALL {
        println!(
            "  {:<8} {}",
            phase.to_string(),
            schedule.slot(phase).next_after(local).format("%a %Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn check_config(config: &TedClubConfig) -> Result<()> {
    config.validate()?;
    parse_timezone(&config.schedule.timezone)?;
    PhaseSchedule::from_config(&config.schedule)?;
    println!("✅ Configuration OK");
    println!("   Topics:   {}", config.workflow.topics.join(", "));
    println!(
        "   Talks:    {}-{} s, need {}, poll {}",
        config.workflow.min_duration_secs,
        config.workflow.max_duration_secs,
        config.workflow.min_candidates,
        config.workflow.batch_size
    );
    println!("   LLM:      {} ({})", config.llm.provider, config.llm.model);
    println!(
        "   Schedule: propose {}, select {}, prepare {} ({})",
        config.schedule.propose,
        config.schedule.select,
        config.schedule.prepare,
        config.schedule.timezone
    );
    println!("   Database: {}", config.store.resolved_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_gateway_reports_panic() {
        assert!(join_gateway(tokio::spawn(async {})).await);

        let panicking = tokio::spawn(async {
            let broken = true;
            if broken {
                panic!("gateway bug");
            }
        });
        assert!(!join_gateway(panicking).await);
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Europe/Berlin").unwrap(), chrono_tz::Europe::Berlin);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
