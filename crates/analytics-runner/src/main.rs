use std::sync::Arc;

use anyhow::{bail, Context, Result};
use finance_core::{AlertQuery, FinanceError, Holding, PortfolioStore, User};
use intelligence_client::{IntelligenceProvider, ScriptedIntelligence};
use portfolio_analytics::{CustomSimulation, FinanceEngine, StaticCommunityData, StaticMarketData};
use portfolio_store::SqliteStore;
use serde::Serialize;

mod config;

use config::RunnerConfig;

fn usage() {
    eprintln!("Usage:");
    eprintln!("  analytics-runner analyze   --user ID                     Analyze a portfolio");
    eprintln!("  analytics-runner refresh   --user ID                     Reprice holdings and recompute value");
    eprintln!("  analytics-runner simulate  --user ID --scenario NAME     Run a preset what-if scenario");
    eprintln!("  analytics-runner simulate  --user ID --action A --params JSON");
    eprintln!("  analytics-runner benchmark --user ID --metric NAME       Compare against the community");
    eprintln!("  analytics-runner alerts    --user ID [--check] [--unread] [--limit N]");
    eprintln!("  analytics-runner import    --user ID --file holdings.json");
    eprintln!("  analytics-runner ask       --user ID --message TEXT [--conversation ID]");
    eprintln!("  analytics-runner conversations --user ID                 List advisor conversations");
    eprintln!("  analytics-runner scenarios                               List preset what-if scenarios");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DATABASE_URL           SQLite URL (default: sqlite:wealth.db)");
    eprintln!("  INTELLIGENCE_API_URL   Intelligence service base URL");
    eprintln!("  INTELLIGENCE_OFFLINE   true to use the built-in deterministic responses");
}

fn flag(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn required(args: &[String], name: &str) -> Result<String> {
    flag(args, name).with_context(|| format!("missing {}", name))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().cloned() else {
        usage();
        std::process::exit(1);
    };

    if let Err(err) = run(&command, &args).await {
        tracing::error!("{} failed: {:#}", command, err);
        // caller mistakes exit 2, everything else 1
        let code = match err.downcast_ref::<FinanceError>() {
            Some(e) if e.is_caller_error() => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(command: &str, args: &[String]) -> Result<()> {
    let config = RunnerConfig::from_env()?;
    tracing::info!("Database: {}", config.database_url);

    let store = Arc::new(
        SqliteStore::new(&config.database_url)
            .await
            .context("failed to open database")?,
    );
    let intelligence: Arc<dyn IntelligenceProvider> = match &config.intelligence {
        Some(intelligence) => {
            let provider = intelligence_client::http_provider(intelligence)?;
            match provider.health().await {
                Ok(true) => tracing::debug!("Intelligence service is healthy"),
                Ok(false) => tracing::warn!("Intelligence service reports unhealthy"),
                Err(e) => tracing::warn!("Intelligence service health check failed: {}", e),
            }
            Arc::new(provider)
        }
        None => {
            tracing::warn!("INTELLIGENCE_OFFLINE set, using deterministic responses");
            Arc::new(ScriptedIntelligence::new())
        }
    };

    let engine = FinanceEngine::new(
        store.clone(),
        intelligence,
        Arc::new(StaticMarketData::default()),
        Arc::new(StaticCommunityData::default()),
        config.engine.clone(),
    );

    if command == "scenarios" {
        return print_json(&engine.simulation.scenarios());
    }

    let user_id = required(args, "--user")?;

    match command {
        "analyze" => print_json(&engine.analyzer.analyze(&user_id).await?)?,
        "refresh" => {
            let (portfolio, metrics) = engine.analyzer.refresh_prices(&user_id).await?;
            print_json(&serde_json::json!({ "portfolio": portfolio, "metrics": metrics }))?;
        }
        "simulate" => {
            let result = if let Some(scenario) = flag(args, "--scenario") {
                engine.simulation.run_what_if(&user_id, &scenario).await?
            } else {
                let action = required(args, "--action")?;
                let parameters = serde_json::from_str(&required(args, "--params")?)
                    .context("--params must be a JSON object")?;
                engine
                    .simulation
                    .run_simulation(&user_id, CustomSimulation { action, parameters })
                    .await?
            };
            print_json(&result)?;
        }
        "benchmark" => {
            let metric = required(args, "--metric")?;
            print_json(&engine.benchmark.community_benchmark(&user_id, &metric).await?)?;
        }
        "alerts" => {
            if args.iter().any(|a| a == "--check") {
                let created = engine.alerts.check_portfolio_alerts(&user_id).await?;
                tracing::info!("{} new alerts", created.len());
            }
            let limit = match flag(args, "--limit") {
                Some(raw) => raw.parse().context("--limit must be a number")?,
                None => AlertQuery::default().limit,
            };
            let query = AlertQuery {
                limit,
                unread_only: args.iter().any(|a| a == "--unread"),
            };
            print_json(&engine.alerts.list_alerts(&user_id, query).await?)?;
        }
        "import" => {
            let path = required(args, "--file")?;
            let raw = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path))?;
            let holdings: Vec<Holding> =
                serde_json::from_str(&raw).with_context(|| format!("{} is not a holdings array", path))?;

            if store.find_user(&user_id).await?.is_none() {
                let user = User::new(&user_id, format!("{}@localhost", user_id), &user_id);
                store.save_user(&user).await?;
                tracing::info!("Created user {}", user_id);
            }
            print_json(&engine.analyzer.add_holdings(&user_id, holdings).await?)?;
        }
        "ask" => {
            let message = required(args, "--message")?;
            let conversation = flag(args, "--conversation");
            print_json(
                &engine
                    .advisor
                    .ask(&user_id, conversation.as_deref(), &message)
                    .await?,
            )?;
        }
        "conversations" => print_json(&engine.advisor.conversations(&user_id).await?)?,
        other => {
            usage();
            bail!("unknown command: {}", other);
        }
    }

    Ok(())
}
