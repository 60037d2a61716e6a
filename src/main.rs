use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentsms::config::Config;
use agentsms::database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "agentsms=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let pool = database::create_pool(&config)?;
    database::run_migrations(&pool)?;

    agentsms::serve(config, pool).await
}
