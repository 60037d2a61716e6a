use anyhow::Result;

use crate::{config, database};

pub fn handle_migrate_command() -> Result<()> {
    let config = config::Config::from_env()?;
    let pool = database::create_pool(&config)?;
    database::run_migrations(&pool)?;
    tracing::info!("migrations completed");
    Ok(())
}
