// Quota Engine - Main Entry Point
//
// Command-line front end over the quota decision engine:
// - Loads limits, usage sources and overrides from a TOML policy file
// - Answers reached-checks and lists quotas per scope
// - Tries out override updates against the in-memory store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quota_engine::config::Config;
use quota_engine::quota::{
    provide_service, InMemoryQuotaStore, QuotaService, ReqContext, Scope, UpdateQuotaCmd,
};
use quota_engine::{logging, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Quota Engine: multi-tenant quota decisions
#[derive(Parser, Debug)]
#[command(name = "quota-engine")]
#[command(author = "Quota Engine Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Multi-tenant quota decision engine", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the policy file (default: ./quota.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a service is at its limit
    Check {
        /// Owning service of the limits to check
        target: String,

        /// Organization of the caller
        #[arg(long, default_value_t = 0)]
        org_id: i64,

        /// User id of the caller
        #[arg(long, default_value_t = 0)]
        user_id: i64,

        /// Check as an unauthenticated caller (global limits only)
        #[arg(long, conflicts_with = "background")]
        anonymous: bool,

        /// Check as a background job with no request context
        #[arg(long)]
        background: bool,
    },
    /// List every limit of a scope with its usage
    List {
        /// Scope kind (global, org, user)
        scope: String,

        /// Organization or user id
        #[arg(default_value_t = 0)]
        id: i64,
    },
    /// Apply an override, then list the affected scope
    Update {
        /// Target resource name
        target: String,

        /// New limit (negative unlimited, zero blocked)
        #[arg(allow_hyphen_values = true)]
        limit: i64,

        /// Organization the override applies to
        #[arg(long, default_value_t = 0)]
        org_id: i64,

        /// User the override applies to
        #[arg(long, default_value_t = 0)]
        user_id: i64,
    },
    /// Print the effective configuration
    ShowConfig,
    /// Print Prometheus metrics after loading the policy
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    logging::init(&config.logging, args.verbose)?;
    metrics::init().context("Failed to register metrics")?;

    info!("Quota Engine v0.1.0 starting...");

    match args.command {
        Some(Commands::Check {
            target,
            org_id,
            user_id,
            anonymous,
            background,
        }) => {
            let service = build_service(&config).await?;
            let ctx = if anonymous {
                ReqContext::anonymous()
            } else {
                ReqContext::signed_in(org_id, user_id)
            };
            let ctx = (!background).then_some(ctx);

            let reached = service
                .quota_reached(ctx.as_ref(), &target)
                .await
                .with_context(|| format!("Quota check for {} failed", target))?;
            println!("{}", if reached { "reached" } else { "not reached" });
        }
        Some(Commands::List { scope, id }) => {
            let service = build_service(&config).await?;
            print_listing(service.as_ref(), &scope, id).await?;
        }
        Some(Commands::Update {
            target,
            limit,
            org_id,
            user_id,
        }) => {
            let service = build_service(&config).await?;
            let cmd = UpdateQuotaCmd {
                target,
                limit,
                org_id,
                user_id,
            };
            service.update(&cmd).await.context("Quota update failed")?;

            let id = match cmd.scope() {
                Scope::Org => org_id,
                Scope::User => user_id,
                Scope::Global => 0,
            };
            print_listing(service.as_ref(), cmd.scope().as_str(), id).await?;
        }
        Some(Commands::ShowConfig) => {
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
        Some(Commands::Metrics) => {
            build_service(&config).await?;
            print!("{}", metrics::gather_metrics()?);
        }
        None => {
            info!("No command specified. Use \"quota-engine --help\" for usage.");
        }
    }

    Ok(())
}

/// Build the service, register declared sources and seed overrides
async fn build_service(config: &Config) -> Result<Arc<dyn QuotaService>> {
    let service = provide_service(&config.quota, Arc::new(InMemoryQuotaStore::new()));

    for registration in config.quota.registrations()? {
        let srv = registration.target_srv.clone();
        service
            .add_reporter(registration)
            .await
            .with_context(|| format!("Failed to register usage source {}", srv))?;
    }

    if config.quota.enabled {
        for cmd in &config.quota.overrides {
            service
                .update(cmd)
                .await
                .with_context(|| format!("Failed to seed override for {}", cmd.target))?;
        }
    }

    debug!(
        sources = config.quota.sources.len(),
        overrides = config.quota.overrides.len(),
        "Quota service ready"
    );
    Ok(service)
}

async fn print_listing(service: &dyn QuotaService, scope: &str, id: i64) -> Result<()> {
    let rows = service
        .get(scope, id)
        .await
        .with_context(|| format!("Failed to list {} quotas", scope))?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
