use xchange_core::{db, EngineConfig};

/// Standalone migration runner. The engine itself is a library; whatever
/// HTTP or admin shell wraps it owns the process that actually serves
/// requests. This binary exists so the schema can be brought up (and
/// exercised in a throwaway environment) without that outer shell.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xchange_core=debug".parse()?),
        )
        .init();

    let config = EngineConfig::from_env();
    tracing::info!(database_url = %config.database_url, "connecting");

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    tracing::info!("migrations applied, exiting");
    Ok(())
}
