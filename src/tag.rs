use crate::db::schema::tags;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

/// Every tag name in the catalog, alphabetically.
pub fn list_all(connection: &mut PgConnection) -> Result<Vec<String>, ApiError> {
    let names = tags::table
        .select(tags::name)
        .distinct()
        .order(tags::name.asc())
        .load::<String>(connection)?;
    Ok(names)
}

#[get("/tags")]
pub async fn get(connection: DbConnection) -> ApiResult<TagsResponse> {
    let tags = connection.run(list_all).await?;
    Ok(Json(TagsResponse { tags }))
}
