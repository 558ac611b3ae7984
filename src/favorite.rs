//! Idempotent favorite toggle. Both directions hand back the article as the
//! user now sees it, with the count recomputed from the relation table.

use crate::article::Article;
use crate::db::schema::favorites;
use crate::types::ApiError;
use diesel::prelude::*;
use diesel::{delete, insert_into};

/// Favorites `article_id` for `user_id`; a no-op when already favorited.
pub fn add(connection: &mut PgConnection, article_id: i32, user_id: i32) -> Result<Article, ApiError> {
    // a missing article trips the foreign key and surfaces as NotFound
    let inserted = insert_into(favorites::table)
        .values((
            favorites::user_id.eq(user_id),
            favorites::article_id.eq(article_id),
        ))
        .on_conflict_do_nothing()
        .execute(connection)?;
    tracing::info!(article_id, user_id, inserted, "favorited article");
    Article::find_by_id(connection, article_id, Some(user_id))?.ok_or(ApiError::NotFound)
}

/// Removes the favorite; a no-op when there was none.
pub fn remove(
    connection: &mut PgConnection,
    article_id: i32,
    user_id: i32,
) -> Result<Article, ApiError> {
    let removed = delete(
        favorites::table
            .filter(favorites::user_id.eq(user_id))
            .filter(favorites::article_id.eq(article_id)),
    )
    .execute(connection)?;
    tracing::info!(article_id, user_id, removed, "unfavorited article");
    Article::find_by_id(connection, article_id, Some(user_id))?.ok_or(ApiError::NotFound)
}
