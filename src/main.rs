use std::{process, sync::Arc};

use tessera::{
    application::error::AppError,
    config,
    domain::blocks::BlockRegistry,
    infra::{
        db::PostgresRepositories, error::InfraError, http, http::ApiState,
        memory::InMemoryRepositories, telemetry,
    },
};
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::Catalog(args) => run_catalog(settings, args),
    }
}

fn load_registry(settings: &config::BlockSettings) -> Result<BlockRegistry, AppError> {
    let mut builder = BlockRegistry::builder();
    builder.with_builtin().map_err(InfraError::from)?;
    for path in &settings.catalog_paths {
        builder.load_catalog_file(path).map_err(InfraError::from)?;
    }
    let registry = builder.build();
    info!(
        target = "tessera::blocks",
        block_types = registry.len(),
        extra_catalogs = settings.catalog_paths.len(),
        "block registry loaded"
    );
    Ok(registry)
}

async fn connect_database(
    settings: &config::DatabaseSettings,
    url: &str,
) -> Result<PostgresRepositories, AppError> {
    let pool = PostgresRepositories::connect(url, settings.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(PostgresRepositories::new(pool))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let registry = Arc::new(load_registry(&settings.blocks)?);
    let debounce = settings.autosave.debounce;

    let state = match settings.database.url.as_deref() {
        Some(url) => {
            let repositories = Arc::new(connect_database(&settings.database, url).await?);
            ApiState::from_repositories(
                repositories.clone(),
                registry,
                debounce,
                Some(repositories),
            )
        }
        None => {
            warn!(
                target = "tessera::startup",
                "no database url configured; pages are kept in memory and lost on exit"
            );
            ApiState::from_repositories(
                Arc::new(InMemoryRepositories::new()),
                registry,
                debounce,
                None,
            )
        }
    };

    let coordinator = state.coordinator.clone();
    let router = http::build_api_router(state);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "tessera::startup",
        addr = %settings.server.addr,
        debounce_secs = debounce.as_secs(),
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    // Pending drafts are autosaved before exit.
    if tokio::time::timeout(settings.server.graceful_shutdown, coordinator.flush_all())
        .await
        .is_err()
    {
        warn!(
            target = "tessera::shutdown",
            "timed out flushing pending autosaves"
        );
    }
    info!(target = "tessera::shutdown", "server stopped");

    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;
    connect_database(&settings.database, url).await?;
    info!(target = "tessera::migrate", "migrations applied");
    Ok(())
}

fn run_catalog(settings: config::Settings, args: config::CatalogArgs) -> Result<(), AppError> {
    let registry = load_registry(&settings.blocks)?;
    let groups = registry.list_by_category();

    if args.json {
        let rendered = serde_json::to_string_pretty(&groups)
            .map_err(|err| AppError::unexpected(err.to_string()))?;
        println!("{rendered}");
        return Ok(());
    }

    for group in groups {
        println!("{}", group.category);
        for block in group.blocks {
            println!("  {:<16} {}  {}", block.type_id, block.label, block.description);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "tessera::shutdown", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "tessera::shutdown", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target = "tessera::shutdown", "shutdown signal received");
}
