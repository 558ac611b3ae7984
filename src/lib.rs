#[macro_use]
extern crate diesel;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate rocket;

pub mod article;
pub mod comment;
pub mod config;
pub mod db;
pub mod errors;
pub mod favorite;
pub mod profile;
pub mod tag;
pub mod types;
pub mod users;
pub mod utils;

use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket};
use serde_json::{json, Value};

#[catch(401)]
fn unauthorized(_req: &Request) -> Json<Value> {
    Json(json!({ "errors": { "status": "401 Unauthorized" } }))
}

#[catch(404)]
fn not_found(_req: &Request) -> Json<Value> {
    Json(json!({ "errors": { "body": ["entity not found"] } }))
}

#[catch(422)]
fn unprocessable(_req: &Request) -> Json<Value> {
    Json(json!({ "errors": { "body": ["unprocessable entity"] } }))
}

#[catch(500)]
fn internal_error(_req: &Request) -> Json<Value> {
    Json(json!({ "errors": { "body": ["internal error"] } }))
}

#[catch(503)]
fn unavailable(_req: &Request) -> Json<Value> {
    Json(json!({ "errors": { "body": ["service unavailable"] } }))
}

pub fn rocket(config: config::Config, pool: db::Pool) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/api",
            routes![
                article::list,
                article::feed,
                article::get,
                article::create,
                article::update,
                article::delete,
                article::favorite,
                article::unfavorite,
                comment::add,
                comment::get,
                comment::delete,
                profile::profile,
                profile::follow,
                profile::unfollow,
                tag::get,
            ],
        )
        .register(
            "/",
            catchers![unauthorized, not_found, unprocessable, internal_error, unavailable],
        )
}
