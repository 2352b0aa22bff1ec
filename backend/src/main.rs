use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_backend::{
    config::Config,
    db::connection::{create_pool, DbPool},
    repositories::{EmployeeDirectory, EmployeeDirectoryTrait, RequestRepository},
    services::{EmailNotificationDispatcher, RequestLifecycleService},
    state::AppState,
    utils::EmailService,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_database_url(&config.database_url),
        jwt_secret = %mask_secret(&config.jwt_secret),
        jwt_expiration_hours = config.jwt_expiration_hours,
        time_zone = %config.time_zone,
        smtp_host = %config.smtp.host,
        smtp_password = %mask_secret(&config.smtp.password),
        smtp_skip_send = config.smtp.skip_send,
        "Loaded configuration from environment/.env"
    );

    let pool: DbPool = create_pool(&config.database_url, config.database_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let directory: Arc<dyn EmployeeDirectoryTrait> = Arc::new(EmployeeDirectory::new(pool.clone()));
    let notifier = EmailNotificationDispatcher::new(
        EmailService::new(&config.smtp)?,
        directory.clone(),
        config.portal_url.clone(),
        config.time_zone,
    );
    let lifecycle = RequestLifecycleService::new(
        Arc::new(RequestRepository::new(pool)),
        directory.clone(),
        Arc::new(notifier),
    );

    let addr = config.bind_address;
    let app = portal_backend::app(AppState::new(config, lifecycle, directory));

    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
