use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate};
use crate::users::Viewer;
use diesel::PgConnection;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

mod models;
pub mod query;
pub mod utils;

pub use self::models::{Article, ArticleList, ArticlePatch, NewArticle};
pub use self::query::{ArticleFilters, ArticleQuery, ArticleQueryBuilder, Page};

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    article: Article,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticle {
    article: NewArticle,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticle {
    article: ArticlePatch,
}

/// Tells a missing article apart from one owned by someone else after an
/// owner scoped mutation matched nothing.
fn missing_or_forbidden(conn: &mut PgConnection, slug: &str) -> ApiError {
    match Article::author_of(conn, slug) {
        Ok(Some(_)) => ApiError::Forbidden,
        Ok(None) => ApiError::NotFound,
        Err(e) => e,
    }
}

#[get("/articles?<tag>&<author>&<favorited>&<limit>&<offset>")]
pub async fn list(
    viewer: Option<Viewer>,
    conn: DbConnection,
    tag: Option<String>,
    author: Option<String>,
    favorited: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<ArticleList> {
    let page = Page::new(limit, offset)?;
    let query = ArticleQuery::builder()
        .filters(ArticleFilters {
            tag,
            author,
            favorited_by: favorited,
        })
        .page(page)
        .viewer(viewer.map(Viewer::id))
        .build()?;
    let articles = conn.run(move |c| Article::list_by(c, query)).await?;
    Ok(Json(articles))
}

#[get("/articles/feed?<limit>&<offset>")]
pub async fn feed(
    current: Viewer,
    conn: DbConnection,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<ArticleList> {
    let page = Page::new(limit, offset)?;
    let articles = conn
        .run(move |c| Article::list_feed(c, current.id(), page))
        .await?;
    Ok(Json(articles))
}

#[get("/articles/<slug>")]
pub async fn get(
    viewer: Option<Viewer>,
    conn: DbConnection,
    slug: String,
) -> ApiResult<ArticleResponse> {
    let viewer = viewer.map(Viewer::id);
    let article = conn
        .run(move |c| Article::find_by_slug(c, &slug, viewer)?.ok_or(ApiError::NotFound))
        .await?;
    Ok(Json(ArticleResponse { article }))
}

#[post("/articles", format = "json", data = "<payload>")]
pub async fn create(
    current: Viewer,
    conn: DbConnection,
    payload: Json<CreateArticle>,
) -> ApiResult<ArticleResponse> {
    let new_article = payload.into_inner().article.validate()?;
    let article = conn
        .run(move |c| Article::create(c, current.id(), &new_article))
        .await?;
    Ok(Json(ArticleResponse { article }))
}

#[put("/articles/<slug>", format = "json", data = "<payload>")]
pub async fn update(
    current: Viewer,
    conn: DbConnection,
    slug: String,
    payload: Json<UpdateArticle>,
) -> ApiResult<ArticleResponse> {
    let patch = payload.into_inner().article;
    let article = conn
        .run(move |c| match Article::update(c, &slug, current.id(), &patch)? {
            Some(article) => Ok(article),
            None => Err(missing_or_forbidden(c, &slug)),
        })
        .await?;
    Ok(Json(ArticleResponse { article }))
}

#[delete("/articles/<slug>")]
pub async fn delete(current: Viewer, conn: DbConnection, slug: String) -> ApiResult<Value> {
    conn.run(move |c| {
        if Article::delete(c, &slug, current.id())? {
            Ok(())
        } else {
            Err(missing_or_forbidden(c, &slug))
        }
    })
    .await?;
    Ok(Json(json!({ "message": "Article deleted" })))
}

#[post("/articles/<slug>/favorite")]
pub async fn favorite(
    current: Viewer,
    conn: DbConnection,
    slug: String,
) -> ApiResult<ArticleResponse> {
    let article = conn
        .run(move |c| {
            let article_id = Article::id_of(c, &slug)?.ok_or(ApiError::NotFound)?;
            crate::favorite::add(c, article_id, current.id())
        })
        .await?;
    Ok(Json(ArticleResponse { article }))
}

#[delete("/articles/<slug>/favorite")]
pub async fn unfavorite(
    current: Viewer,
    conn: DbConnection,
    slug: String,
) -> ApiResult<ArticleResponse> {
    let article = conn
        .run(move |c| {
            let article_id = Article::id_of(c, &slug)?.ok_or(ApiError::NotFound)?;
            crate::favorite::remove(c, article_id, current.id())
        })
        .await?;
    Ok(Json(ArticleResponse { article }))
}
