use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use tokio::{signal, sync::Notify};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        error::AppError,
        repos::{CreateGroupParams, GroupsRepo},
    },
    cache::{FragmentCache, FragmentCacheConfig},
    config,
    domain::slug::{generate_unique_slug_async, validate_slug},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpOptions, HttpState, SessionCookie},
        telemetry,
        uploads::MediaStorage,
    },
};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const GROUP_TITLE_MAX_LEN: usize = 200;

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
        config::Command::Groups(args) => match args.command {
            config::GroupsCommand::Add(add) => run_group_add(settings, add).await,
        },
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let media = MediaStorage::new(settings.uploads.directory.clone())
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let fragments = FragmentCache::new(FragmentCacheConfig::from(&settings.cache));

    let options = HttpOptions {
        session_cookie: SessionCookie {
            name: settings.sessions.cookie_name.clone(),
            secure: settings.sessions.secure_cookie,
            ttl: session_ttl(settings.sessions.ttl)?,
        },
        max_request_bytes: usize::try_from(settings.uploads.max_request_bytes.get())
            .unwrap_or(usize::MAX),
    };
    let state = HttpState::from_repositories(
        repositories,
        Arc::new(media),
        Arc::new(fragments),
        options,
    );

    let purge_handle = spawn_session_purge(state.accounts.clone());
    let result = serve_http(&settings, state).await;
    purge_handle.abort();
    result
}

async fn run_group_add(
    settings: config::Settings,
    args: config::GroupAddArgs,
) -> Result<(), AppError> {
    let title = args.title.trim().to_string();
    if title.is_empty() || title.chars().count() > GROUP_TITLE_MAX_LEN {
        return Err(AppError::validation(format!(
            "group title must be between 1 and {GROUP_TITLE_MAX_LEN} characters"
        )));
    }

    let repositories = init_repositories(&settings).await?;
    let repos = repositories.as_ref();

    let slug = match args.slug {
        Some(slug) => {
            validate_slug(&slug).map_err(|err| AppError::validation(err.to_string()))?;
            slug
        }
        None => generate_unique_slug_async(&title, |candidate| {
            let candidate = candidate.to_string();
            async move {
                repos
                    .find_group_by_slug(&candidate)
                    .await
                    .map(|found| found.is_none())
            }
        })
        .await
        .map_err(|err| AppError::validation(err.to_string()))?,
    };

    let group = repos
        .create_group(CreateGroupParams {
            title,
            slug,
            description: args.description,
        })
        .await?;

    info!(
        target = "yatube::cli",
        group_id = group.id,
        slug = %group.slug,
        "group created"
    );
    println!("created group `{}` at /group/{}/", group.title, group.slug);
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn session_ttl(ttl: Duration) -> Result<time::Duration, AppError> {
    time::Duration::try_from(ttl).map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "session ttl out of range: {err}"
        )))
    })
}

fn spawn_session_purge(accounts: Arc<AccountService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match accounts.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => info!(
                    target = "yatube::accounts",
                    removed,
                    "purged expired sessions"
                ),
                Err(err) => warn!(
                    target = "yatube::accounts",
                    error = %err,
                    "failed to purge expired sessions"
                ),
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "yatube::server",
        addr = %settings.server.addr,
        "listening"
    );

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown({
            let stop = stop.clone();
            async move { stop.notified().await }
        })
        .into_future();
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        () = shutdown_signal() => {
            info!(target = "yatube::server", "shutdown requested, draining connections");
            stop.notify_one();
            match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(target = "yatube::server", "graceful shutdown timed out");
                    Ok(())
                }
            }
        }
    };

    result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
