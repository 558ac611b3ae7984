mod common;

use common::{add_article, add_user};
use conduit::config::Config;
use conduit::db::Pool;
use conduit::users::Claims;
use diesel::r2d2::ConnectionManager;
use diesel::PgConnection;
use jsonwebtoken::{encode, EncodingKey, Header};
use rocket::http::{ContentType, Header as HttpHeader, Status};
use rocket::local::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

const SECRET: &str = "http-test-secret";
// Nothing listens here, so every checkout fails fast.
const UNREACHABLE: &str = "postgres://conduit@127.0.0.1:1/conduit";

fn client_over(pool: Pool) -> Client {
    let config = Config {
        database_url: UNREACHABLE.to_owned(),
        secret: SECRET.to_owned(),
        pool_size: 1,
        run_migrations: false,
    };
    Client::tracked(conduit::rocket(config, pool)).expect("valid rocket instance")
}

fn client() -> Client {
    let pool: Pool = r2d2::Pool::builder()
        .max_size(1)
        .min_idle(Some(0))
        .connection_timeout(Duration::from_millis(250))
        .build_unchecked(ConnectionManager::<PgConnection>::new(UNREACHABLE));
    client_over(pool)
}

fn auth(user_id: i32) -> HttpHeader<'static> {
    HttpHeader::new("Authorization", format!("Token {}", token(user_id)))
}

fn token(user_id: i32) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: 4_102_444_800,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn body(response: rocket::local::blocking::LocalResponse) -> Value {
    response.into_json::<Value>().expect("json body")
}

#[test]
fn feed_requires_a_token() {
    let client = client();
    let response = client.get("/api/articles/feed").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(body(response), json!({ "errors": { "status": "401 Unauthorized" } }));
}

#[test]
fn feed_rejects_a_forged_token() {
    let client = client();
    let response = client
        .get("/api/articles/feed")
        .header(HttpHeader::new("Authorization", "Token not.a.jwt"))
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn creating_an_article_requires_a_token() {
    let client = client();
    let response = client
        .post("/api/articles")
        .header(ContentType::JSON)
        .body(r#"{"article":{"title":"t","description":"d","body":"b"}}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn mutations_require_a_token() {
    let client = client();
    let requests = [
        client.delete("/api/articles/some-slug"),
        client.post("/api/articles/some-slug/favorite"),
        client.delete("/api/articles/some-slug/favorite"),
        client.delete("/api/articles/some-slug/comments/1"),
        client.post("/api/profiles/someone/follow"),
        client.delete("/api/profiles/someone/follow"),
    ];
    for request in requests {
        assert_eq!(request.dispatch().status(), Status::Unauthorized);
    }
}

#[test]
fn a_valid_token_reaches_the_database_guard() {
    let client = client();
    let response = client
        .get("/api/articles/feed")
        .header(auth(7))
        .dispatch();
    assert_eq!(response.status(), Status::ServiceUnavailable);
    assert_eq!(
        body(response),
        json!({ "errors": { "body": ["service unavailable"] } })
    );
}

#[test]
fn public_reads_fail_softly_without_a_database() {
    let client = client();
    for uri in ["/api/articles", "/api/tags", "/api/articles/some-slug/comments"] {
        assert_eq!(client.get(uri).dispatch().status(), Status::ServiceUnavailable);
    }
}

#[test]
fn unknown_routes_answer_with_json() {
    let client = client();
    let response = client.get("/api/nothing-here").dispatch();
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(response.content_type(), Some(ContentType::JSON));
    assert_eq!(body(response), json!({ "errors": { "body": ["entity not found"] } }));
}

#[test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
fn article_mutations_tell_forbidden_from_missing() {
    let pool = common::pool();
    let (owner, intruder, slug) = {
        let mut conn = pool.get().unwrap();
        let owner = add_user(&mut conn, "owner");
        let intruder = add_user(&mut conn, "intruder");
        let article = add_article(&mut conn, &owner, "Owned", &[]);
        (owner, intruder, article.slug)
    };
    let client = client_over(pool);
    let patch = r#"{"article":{"title":"Taken over"}}"#;

    let response = client
        .put(format!("/api/articles/{}", slug))
        .header(ContentType::JSON)
        .header(auth(intruder.id))
        .body(patch)
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(body(response), json!({ "errors": { "body": ["forbidden"] } }));

    let response = client
        .put("/api/articles/no-such-slug")
        .header(ContentType::JSON)
        .header(auth(intruder.id))
        .body(patch)
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let response = client
        .delete(format!("/api/articles/{}", slug))
        .header(auth(intruder.id))
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .delete(format!("/api/articles/{}", slug))
        .header(auth(owner.id))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response), json!({ "message": "Article deleted" }));

    let response = client.get(format!("/api/articles/{}", slug)).dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
fn comment_delete_is_reserved_for_its_author() {
    let pool = common::pool();
    let (author, intruder, slug) = {
        let mut conn = pool.get().unwrap();
        let author = add_user(&mut conn, "author");
        let intruder = add_user(&mut conn, "intruder");
        let article = add_article(&mut conn, &author, "Commented", &[]);
        (author, intruder, article.slug)
    };
    let client = client_over(pool);

    let response = client
        .post(format!("/api/articles/{}/comments", slug))
        .header(ContentType::JSON)
        .header(auth(author.id))
        .body(r#"{"comment":{"body":"First!"}}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let created = body(response);
    assert_eq!(created["comment"]["body"], "First!");
    assert_eq!(created["comment"]["author"]["username"], author.username.as_str());
    let id = created["comment"]["id"].as_i64().unwrap();

    let comment_uri = format!("/api/articles/{}/comments/{}", slug, id);
    let response = client.delete(comment_uri.as_str()).header(auth(intruder.id)).dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .delete(format!("/api/articles/{}/comments/{}", slug, id + 1000))
        .header(auth(author.id))
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let response = client.delete(comment_uri.as_str()).header(auth(author.id)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response), json!({ "message": "Comment deleted" }));

    let response = client.get(format!("/api/articles/{}/comments", slug)).dispatch();
    assert_eq!(body(response), json!({ "comments": [] }));
}

#[test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
fn create_and_favorite_answer_with_article_envelopes() {
    let pool = common::pool();
    let (author, fan) = {
        let mut conn = pool.get().unwrap();
        (add_user(&mut conn, "author"), add_user(&mut conn, "fan"))
    };
    let client = client_over(pool);

    let response = client
        .post("/api/articles")
        .header(ContentType::JSON)
        .header(auth(author.id))
        .body(
            r#"{"article":{"title":"How to Article","description":"A test article.",
                "body":"This is just a test!","tagList":["test","article"]}}"#,
        )
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let created = body(response);
    let article = &created["article"];
    assert_eq!(article["tagList"], json!(["article", "test"]));
    assert_eq!(article["favorited"], false);
    assert_eq!(article["favoritesCount"], 0);
    assert_eq!(article["author"]["username"], author.username.as_str());
    assert!(article.get("id").is_none());
    let slug = article["slug"].as_str().unwrap().to_owned();
    assert!(slug.starts_with("how-to-article-"));

    let response = client
        .post(format!("/api/articles/{}/favorite", slug))
        .header(auth(fan.id))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let favorited = body(response);
    assert_eq!(favorited["article"]["favorited"], true);
    assert_eq!(favorited["article"]["favoritesCount"], 1);

    let response = client
        .get(format!("/api/articles?author={}&limit=0", author.username))
        .dispatch();
    assert_eq!(body(response)["articlesCount"], 1);
}

#[test]
#[ignore = "requires PostgreSQL at DATABASE_URL"]
fn invalid_input_is_unprocessable() {
    let pool = common::pool();
    let author = {
        let mut conn = pool.get().unwrap();
        add_user(&mut conn, "author")
    };
    let client = client_over(pool);

    let response = client.get("/api/articles?limit=-1").dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert_eq!(
        body(response),
        json!({ "errors": { "limit": ["limit must not be negative"] } })
    );

    let response = client
        .post("/api/articles")
        .header(ContentType::JSON)
        .header(auth(author.id))
        .body(r#"{"article":{"title":" ","description":"d","body":"b"}}"#)
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert_eq!(body(response), json!({ "errors": { "title": ["empty title"] } }));
}
