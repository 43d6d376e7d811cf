use std::{process, sync::Arc, time::Duration};

use fernlog::{
    application::{
        error::AppError,
        feed::FeedService,
        follow::FollowService,
        groups::GroupService,
        posts::PostService,
        query::FeedQueryEngine,
        repos::{CommentsRepo, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo},
    },
    cache::{CacheConfig, PageCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use tokio::{net::TcpListener, sync::watch, try_join};
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
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (http_state, admin_state) = match settings.database.url.as_deref() {
        Some(url) => {
            let repositories = Arc::new(connect_postgres(url, &settings).await?);
            build_states(repositories.clone(), Some(repositories), &settings)
        }
        None => {
            warn!(
                target = "fernlog::serve",
                "no database url configured; serving from the in-memory store"
            );
            build_states(Arc::new(MemoryRepositories::new()), None, &settings)
        }
    };

    serve_http(&settings, http_state, admin_state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;
    connect_postgres(url, &settings).await?;
    info!(target = "fernlog::migrate", "migrations applied");
    Ok(())
}

async fn connect_postgres(
    url: &str,
    settings: &config::Settings,
) -> Result<PostgresRepositories, AppError> {
    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(PostgresRepositories::new(pool))
}

fn build_states<R>(
    repositories: Arc<R>,
    db: Option<Arc<PostgresRepositories>>,
    settings: &config::Settings,
) -> (HttpState, AdminState)
where
    R: PostsRepo + PostsWriteRepo + GroupsRepo + FollowsRepo + CommentsRepo + 'static,
{
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories;

    let cache = Arc::new(PageCache::new(CacheConfig::from(&settings.cache)));
    let engine = FeedQueryEngine::new(
        posts_repo.clone(),
        groups_repo.clone(),
        follows_repo.clone(),
    );
    let feed = Arc::new(FeedService::new(engine, cache, settings.feed.page_size));
    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo,
        groups_repo.clone(),
        comments_repo,
    ));
    let follows = Arc::new(FollowService::new(follows_repo));
    let groups = Arc::new(GroupService::new(groups_repo));

    let http_state = HttpState {
        feed: feed.clone(),
        posts,
        follows,
        identity_header: settings.identity.header.clone(),
    };
    let admin_state = AdminState { feed, groups, db };

    (http_state, admin_state)
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = bind(settings.server.public_addr).await?;
    let admin_listener = bind(settings.server.admin_addr).await?;

    info!(
        target = "fernlog::serve",
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "fernlog::serve", error = %err, "failed to listen for shutdown signal");
            return;
        }
        info!(target = "fernlog::serve", "shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_requested(shutdown_rx.clone()));

    tokio::select! {
        result = async { try_join!(public_server, admin_server) } => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(shutdown_rx, settings.server.graceful_shutdown) => {
            warn!(
                target = "fernlog::serve",
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn bind(addr: std::net::SocketAddr) -> Result<TcpListener, AppError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::from(InfraError::Bind { addr, source }))
}

async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves `grace` after shutdown was requested.
async fn drain_deadline(rx: watch::Receiver<bool>, grace: Duration) {
    shutdown_requested(rx).await;
    tokio::time::sleep(grace).await;
}
