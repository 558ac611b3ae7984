use dotenv::dotenv;
use crate::errors::{Result, ResultExt};
use std::env;

pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Process wide settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// HS256 secret used to verify `Authorization: Token <jwt>` headers.
    pub secret: String,
    pub pool_size: u32,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL").chain_err(|| "DATABASE_URL must be set")?;
        let secret = env::var("SECRET_KEY").chain_err(|| "SECRET_KEY must be set")?;

        let pool_size = match env::var("DATABASE_POOL_SIZE") {
            Ok(size) => size
                .parse::<u32>()
                .chain_err(|| format!("invalid DATABASE_POOL_SIZE: {}", size))?,
            Err(_) => DEFAULT_POOL_SIZE,
        };

        let run_migrations = match env::var("RUN_MIGRATIONS") {
            Ok(flag) => flag
                .parse::<bool>()
                .chain_err(|| format!("invalid RUN_MIGRATIONS: {}", flag))?,
            Err(_) => true,
        };

        Ok(Config {
            database_url,
            secret,
            pool_size,
            run_migrations,
        })
    }
}
