use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use riot_ratelimit::{store::pool, Config, Decision, HeaderPair, RateLimit, RoutingValue};
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Operator CLI for the rate limiter: exercise `hit`/`refresh` against a real
/// store and inspect the keys the library writes. The key layout is part of
/// the external contract, so reading it directly for dashboards is a
/// supported use case.
#[derive(Parser)]
#[command(name = "riotctl", about = "Inspect and exercise the Riot API rate limiter store")]
struct Cli {
    #[arg(short, long, default_value = "riotctl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask whether a call to (routing, endpoint) would be admitted right now.
    Hit { routing: String, endpoint: String },
    /// Feed response headers (as JSON: `[["name","value"], ...]` on stdin)
    /// through `refresh` for (routing, endpoint).
    Refresh { routing: String, endpoint: String },
    /// Print whether a policy has been bootstrapped for (routing, endpoint).
    PolicyKnown { routing: String, endpoint: String },
    /// Render current Prometheus metrics text.
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _tracing_guard = init_tracing();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("loading riotctl configuration")?;

    match cli.command {
        Command::Hit { routing, endpoint } => {
            let routing = parse_routing(&routing)?;
            let limiter = RateLimit::new(&config)?;
            tracing::info!(%routing, %endpoint, at = %now_rfc3339(), "hit");
            match limiter.hit(routing, &endpoint).await? {
                Decision::Allow(entries) => {
                    println!("allow");
                    for entry in entries {
                        println!("  {entry:?}");
                    }
                }
                Decision::Throttle(entries) => {
                    println!("throttle");
                    for entry in entries {
                        println!("  {entry:?} ttl={}", format_ttl(entry.ttl));
                    }
                }
            }
        }
        Command::Refresh { routing, endpoint } => {
            let routing = parse_routing(&routing)?;
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("reading headers from stdin")?;
            let headers: Vec<HeaderPair> =
                serde_json::from_str(&raw).context("parsing headers JSON")?;

            let limiter = RateLimit::new(&config)?;
            tracing::info!(%routing, %endpoint, at = %now_rfc3339(), "refresh");
            let entries = limiter.refresh(&headers, routing, &endpoint, SystemTime::now()).await?;
            println!("recorded {} entries", entries.len());
            for entry in entries {
                println!("  {entry:?}");
            }
        }
        Command::PolicyKnown { routing, endpoint } => {
            let routing = parse_routing(&routing)?;
            let redis_pool = pool::connect(&config)?;
            let known = riot_ratelimit::store::policy::known(&redis_pool, routing, &endpoint).await?;
            println!("{known}");
        }
        Command::Metrics => {
            let handle = riot_ratelimit::metrics::Metrics::install();
            print!("{}", handle.render());
        }
    }

    Ok(())
}

fn parse_routing(s: &str) -> Result<RoutingValue> {
    RoutingValue::from_str(s).map_err(|e| anyhow::anyhow!("{e}"))
}

/// Renders a TTL the way an operator reads it off a dashboard, not as raw seconds.
fn format_ttl(ttl: Option<u64>) -> String {
    match ttl {
        Some(secs) => humantime::format_duration(std::time::Duration::from_secs(secs)).to_string(),
        None => "-".to_string(),
    }
}

fn now_rfc3339() -> String {
    humantime::format_rfc3339_seconds(SystemTime::now()).to_string()
}

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .lossy(true)
        .finish(std::io::stdout());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_target(false))
        .init();

    guard
}
