use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taste_curator::{
    api::{create_router, AppState},
    config::Config,
    db::{self, Cache, PgDatasetStore},
    error::AppError,
    models::{MediaKind, RunRequest},
    services::{
        orchestrator,
        providers::{ArrClient, PlexClient, TmdbProvider},
        Engine, EngineSettings, RunContext,
    },
};

/// Exit code for configuration problems found before any work started
const EXIT_CONFIGURATION: u8 = 20;

#[derive(Parser)]
#[command(name = "taste-curator", version, about = "Curated recommendation collections for Plex")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Run once and print the JSON report
    Sweep {
        #[arg(long)]
        dry_run: bool,
        /// Only this user
        #[arg(long)]
        user: Option<String>,
        /// Only this library (requires --user)
        #[arg(long, requires = "user")]
        library: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taste_curator=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Sweep {
            dry_run,
            user,
            library,
        } => sweep(dry_run, user, library).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            match e.downcast_ref::<AppError>() {
                Some(AppError::Configuration(_)) => ExitCode::from(EXIT_CONFIGURATION),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn serve() -> anyhow::Result<ExitCode> {
    let config = load_config()?;
    let (engine, cache_writer) = build_engine(&config).await?;
    let state = AppState::new(engine).with_defaults(config.dry_run, config.shuffle_seed);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }
    Ok(ExitCode::SUCCESS)
}

async fn sweep(
    dry_run: bool,
    user: Option<String>,
    library: Option<String>,
) -> anyhow::Result<ExitCode> {
    let config = load_config()?;
    let (engine, cache_writer) = build_engine(&config).await?;

    let ctx = RunContext::new(dry_run || config.dry_run).with_shuffle_seed(config.shuffle_seed);
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing the current library");
            cancel.cancel();
        }
    });

    let request = RunRequest {
        user_id: user,
        library_id: library,
        batches: None,
        dry_run: Some(ctx.dry_run),
    };
    let report = orchestrator::execute(&engine, &ctx, &request).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }
    tracing::info!(status = ?report.status, "FINAL_STATUS");
    Ok(ExitCode::from(report.status.exit_code() as u8))
}

fn load_config() -> Result<Config, AppError> {
    Config::from_env().map_err(|e| AppError::Configuration(e.to_string()))
}

/// Wires the configured collaborators into an engine
async fn build_engine(
    config: &Config,
) -> anyhow::Result<(Engine, Option<db::CacheWriterHandle>)> {
    let (plex_url, plex_token) = config.plex_connection()?;
    let media = PlexClient::new(plex_url, plex_token)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    let store = PgDatasetStore::new(pool);

    let mut engine = Engine::new(
        Arc::new(store),
        Arc::new(media),
        EngineSettings::from_config(config),
    );

    let mut cache_writer = None;
    if let Some(api_key) = config.tmdb_key() {
        let cache = match db::create_redis_client(&config.redis_url) {
            Ok(client) => {
                let (cache, writer) = Cache::new(client);
                cache_writer = Some(writer);
                Some(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable; metadata lookups are not cached");
                None
            }
        };
        let tmdb = TmdbProvider::new(api_key.to_string(), config.tmdb_api_url.clone(), cache)?;
        engine = engine.with_metadata(Arc::new(tmdb));
    } else {
        tracing::info!("TMDB_API_KEY not set; vote stats enrichment disabled");
    }

    if let Some(radarr) = config.radarr() {
        engine = engine.with_download_requester(MediaKind::Movie, Arc::new(ArrClient::radarr(radarr)?));
    }
    if let Some(sonarr) = config.sonarr() {
        engine = engine.with_download_requester(MediaKind::Show, Arc::new(ArrClient::sonarr(sonarr)?));
    }

    Ok((engine, cache_writer))
}
