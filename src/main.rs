use std::{process, sync::Arc, time::Duration};

use postern::{
    application::{
        admin::{AdminService, CreateGroupCommand},
        error::AppError,
        repos::Repositories,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryRepositories,
        telemetry,
    },
};
use tokio::signal;
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
        config::Command::Users(args) => run_users(settings, args.command).await,
        config::Command::Groups(args) => run_groups(settings, args.command).await,
        config::Command::Posts(args) => run_posts(settings, args.command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let http_state = HttpState::new(repositories, &settings);
    serve_http(&settings, http_state).await
}

async fn run_users(
    settings: config::Settings,
    command: config::UsersCommand,
) -> Result<(), AppError> {
    let admin = admin_service(&settings).await?;
    match command {
        config::UsersCommand::Create {
            username,
            first_name,
            last_name,
        } => {
            let user = admin.create_user(&username, &first_name, &last_name).await?;
            info!(target = "postern::cli", user_id = user.id, username = %user.username, "user created");
        }
        config::UsersCommand::Delete { username } => {
            admin.delete_user(&username).await?;
            info!(target = "postern::cli", username = %username, "user deleted");
        }
    }
    Ok(())
}

async fn run_groups(
    settings: config::Settings,
    command: config::GroupsCommand,
) -> Result<(), AppError> {
    let admin = admin_service(&settings).await?;
    match command {
        config::GroupsCommand::Create {
            title,
            slug,
            description,
        } => {
            let group = admin
                .create_group(CreateGroupCommand {
                    title,
                    slug,
                    description,
                })
                .await?;
            info!(target = "postern::cli", group_id = group.id, slug = %group.slug, "group created");
        }
        config::GroupsCommand::Delete { slug } => {
            admin.delete_group(&slug).await?;
            info!(target = "postern::cli", slug = %slug, "group deleted");
        }
    }
    Ok(())
}

async fn run_posts(
    settings: config::Settings,
    command: config::PostsCommand,
) -> Result<(), AppError> {
    let admin = admin_service(&settings).await?;
    match command {
        config::PostsCommand::Delete { id } => {
            admin.delete_post(id).await?;
            info!(target = "postern::cli", post_id = id, "post deleted");
        }
    }
    Ok(())
}

/// Operator commands only make sense against persistent storage.
async fn admin_service(settings: &config::Settings) -> Result<AdminService, AppError> {
    if settings.database.url.is_none() {
        return Err(AppError::from(InfraError::configuration(
            "database url is required for administrative commands",
        )));
    }
    Ok(AdminService::new(init_repositories(settings).await?))
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let Some(database_url) = settings.database.url.as_ref() else {
        warn!(
            target = "postern::startup",
            "database url is not configured; using in-memory storage"
        );
        return Ok(Repositories::from_backend(Arc::new(
            InMemoryRepositories::new(),
        )));
    };

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Repositories::from_backend(Arc::new(
        PostgresRepositories::new(pool),
    )))
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "postern::startup",
        addr = %settings.server.addr,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let server = async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    // Draining in-flight requests is capped at `server.graceful_shutdown`.
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(grace) => {
            warn!(
                target = "postern::shutdown",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out"
            );
        }
    }

    info!(target = "postern::shutdown", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
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
                error!(error = %err, "failed to listen for SIGTERM");
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
    info!(target = "postern::shutdown", "shutdown signal received");
}

/// Resolves `grace` after the shutdown signal; never resolves before it.
async fn drain_deadline(grace: Duration) {
    shutdown_signal().await;
    tokio::time::sleep(grace).await;
}
