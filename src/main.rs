use spinventory::{
    api::{self, AppState},
    auth::AuthMode,
    config::{database, settings},
    errors::Result,
    mail::Mailer,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Settings file and secrets
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Critical error loading settings: {}", e))?;
    let auth = AuthMode::from_env()?;
    if auth.is_signed() {
        info!("Signed sessions enabled");
    } else {
        info!("No auth secret configured, trusting client-supplied identity");
    }
    let mailer = Mailer::from_config(&app_config.mail)?;

    // 4. Database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Serve
    let router = api::build_router(
        AppState::new(db, auth, mailer),
        app_config.server.cors_permissive,
    );
    let listener = tokio::net::TcpListener::bind(&app_config.server.bind)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", app_config.server.bind, e))?;
    info!("Listening on {}", app_config.server.bind);

    axum::serve(listener, router).await?;
    Ok(())
}
