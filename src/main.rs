use conduit::config::Config;
use conduit::db;
use conduit::errors::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("conduit=info,rocket=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config)?;
    if config.run_migrations {
        let mut connection = pool.get()?;
        db::run_migrations(&mut connection)?;
    }

    tracing::info!(pool_size = config.pool_size, "starting conduit");
    rocket::execute(conduit::rocket(config, pool).launch())
        .map(drop)
        .map_err(|e| e.to_string().into())
}
