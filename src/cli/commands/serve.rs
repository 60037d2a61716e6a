use anyhow::Result;

use crate::{config, database};

pub async fn handle_serve_command() -> Result<()> {
    let config = config::Config::from_env()?;
    let pool = database::create_pool(&config)?;
    database::run_migrations(&pool)?;

    crate::serve(config, pool).await
}
