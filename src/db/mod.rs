use crate::config::Config;
use crate::errors::{ErrorKind, Result};
use crate::types::ApiError;
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome};
use rocket::tokio::task;
use rocket::{Request, State};

pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// An alias to the type for a pool of Diesel Postgres connections.
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// One pooled connection, held for the lifetime of a single request.
pub struct DbConnection(pub r2d2::PooledConnection<ConnectionManager<PgConnection>>);

/// Checks a connection out of the managed pool. Fails with
/// `InternalServerError` when no pool is managed and with `ServiceUnavailable`
/// when the pool times out.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = match request.guard::<&State<Pool>>().await {
            Outcome::Success(pool) => pool.inner().clone(),
            _ => return Outcome::Error((Status::InternalServerError, ())),
        };
        match task::spawn_blocking(move || pool.get()).await {
            Ok(Ok(conn)) => Outcome::Success(DbConnection(conn)),
            Ok(Err(error)) => {
                tracing::warn!(%error, "connection pool exhausted");
                Outcome::Error((Status::ServiceUnavailable, ()))
            }
            Err(_) => Outcome::Error((Status::InternalServerError, ())),
        }
    }
}

impl DbConnection {
    /// Runs blocking Diesel work on the blocking thread pool. The connection
    /// goes back to the pool once `f` returns, whatever its outcome.
    pub async fn run<F, T>(self, f: F) -> std::result::Result<T, ApiError>
    where
        F: FnOnce(&mut PgConnection) -> std::result::Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let mut conn = self.0;
        task::spawn_blocking(move || f(&mut conn))
            .await
            .map_err(|_| ApiError::Internal)?
    }
}

pub fn init_pool(config: &Config) -> Result<Pool> {
    let manager = ConnectionManager::<PgConnection>::new(config.database_url.as_str());
    let pool = Pool::builder().max_size(config.pool_size).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(connection: &mut PgConnection) -> Result<()> {
    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ErrorKind::Migration(e.to_string()))?;
    for version in applied {
        tracing::info!(%version, "applied migration");
    }
    Ok(())
}
