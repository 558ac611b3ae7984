#![allow(dead_code)]

use conduit::article::{Article, NewArticle};
use conduit::db::{self, Pool};
use conduit::users::models::{NewUser, User};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Error as PoolError};
use once_cell::sync::Lazy;

static DATABASE_URL: Lazy<String> = Lazy::new(|| {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let mut conn = PgConnection::establish(&url).expect("failed to connect for migrations");
    db::run_migrations(&mut conn).expect("failed to run migrations");
    url
});

/// A connection inside a transaction that is rolled back when dropped.
pub fn connection() -> PgConnection {
    let mut conn = PgConnection::establish(&DATABASE_URL).expect("failed to connect");
    conn.begin_test_transaction()
        .expect("failed to begin test transaction");
    conn
}

#[derive(Debug)]
struct TestTransaction;

impl CustomizeConnection<PgConnection, PoolError> for TestTransaction {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), PoolError> {
        conn.begin_test_transaction().map_err(PoolError::QueryError)
    }
}

/// A pool of exactly one connection that never commits, so fixtures and
/// requests share one rolled back transaction. Return every checkout before
/// dispatching a request.
pub fn pool() -> Pool {
    Pool::builder()
        .max_size(1)
        .connection_customizer(Box::new(TestTransaction))
        .build(ConnectionManager::new(DATABASE_URL.as_str()))
        .expect("failed to build test pool")
}

pub fn add_user(conn: &mut PgConnection, name: &str) -> User {
    let username = format!("{}-{:08x}", name, rand::random::<u32>());
    let email = format!("{}@example.com", username);
    User::create(
        &NewUser {
            username: &username,
            email: &email,
            bio: Some("I write things."),
            image: None,
        },
        conn,
    )
    .expect("failed to create user")
}

pub fn new_article(title: &str, tags: &[&str]) -> NewArticle {
    NewArticle {
        title: title.to_owned(),
        description: format!("About {}", title),
        body: format!("The body of {}", title),
        tag_list: tags.iter().map(|tag| tag.to_string()).collect(),
    }
}

pub fn add_article(conn: &mut PgConnection, author: &User, title: &str, tags: &[&str]) -> Article {
    Article::create(conn, author.id, &new_article(title, tags)).expect("failed to create article")
}
