use crate::article::Article;
use crate::db::schema::comments;
use crate::db::DbConnection;
use crate::profile::Profile;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::users::Viewer;
use crate::utils::serialize_date;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Bool, Integer, Nullable, Text, Timestamptz};
use diesel::{delete as diesel_delete, insert_into};
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

static SELECT_ARTICLE_COMMENTS: &str = "SELECT c.id, c.body, c.created_at, c.updated_at, \
     u.id AS author_id, u.username AS author_username, u.bio AS author_bio, \
     u.image AS author_image, \
     EXISTS (SELECT 1 FROM follows fl \
             WHERE fl.followed_id = u.id AND fl.follower_id = $1) AS following \
     FROM comments c INNER JOIN users u ON u.id = c.user_id \
     WHERE c.article_id = $2 \
     ORDER BY c.created_at ASC, c.id ASC";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub body: String,
    pub author: Profile,
}

#[derive(Debug, QueryableByName)]
struct CommentRow {
    #[diesel(sql_type = Integer)]
    id: i32,
    #[diesel(sql_type = Text)]
    body: String,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    updated_at: DateTime<Utc>,
    #[diesel(sql_type = Integer)]
    author_id: i32,
    #[diesel(sql_type = Text)]
    author_username: String,
    #[diesel(sql_type = Nullable<Text>)]
    author_bio: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    author_image: Option<String>,
    #[diesel(sql_type = Bool)]
    following: bool,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            body: row.body,
            author: Profile {
                id: row.author_id,
                username: row.author_username,
                bio: row.author_bio,
                image: row.author_image,
                following: row.following,
            },
        }
    }
}

#[derive(Debug, Queryable)]
struct StoredComment {
    id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    body: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentBody {
    pub body: String,
}

impl Validate for CommentBody {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        if self.body.trim().is_empty() {
            Err(ValidationError::from("body", "empty body"))
        } else {
            Ok(self)
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentContainer<T> {
    comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentsContainer<T> {
    comments: T,
}

impl Comment {
    /// Adds a comment to the article at `slug`.
    pub fn create(
        connection: &mut PgConnection,
        slug: &str,
        author_id: i32,
        body: &str,
    ) -> Result<Comment, ApiError> {
        let article_id = Article::id_of(connection, slug)?.ok_or(ApiError::NotFound)?;
        let stored = insert_into(comments::table)
            .values((
                comments::article_id.eq(article_id),
                comments::user_id.eq(author_id),
                comments::body.eq(body),
            ))
            .returning((
                comments::id,
                comments::created_at,
                comments::updated_at,
                comments::body,
            ))
            .get_result::<StoredComment>(connection)?;
        let author =
            Profile::load_by_id(connection, author_id, Some(author_id))?.ok_or(ApiError::NotFound)?;
        tracing::info!(comment_id = stored.id, article_id, author_id, "created comment");
        Ok(Comment {
            id: stored.id,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            body: stored.body,
            author,
        })
    }

    /// Comments on the article at `slug`, oldest first.
    pub fn list(
        connection: &mut PgConnection,
        slug: &str,
        viewer: Option<i32>,
    ) -> Result<Vec<Comment>, ApiError> {
        let article_id = Article::id_of(connection, slug)?.ok_or(ApiError::NotFound)?;
        let rows = sql_query(SELECT_ARTICLE_COMMENTS)
            .bind::<Nullable<Integer>, _>(viewer)
            .bind::<Integer, _>(article_id)
            .load::<CommentRow>(connection)?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    /// Deletes comment `id` only when it belongs to the article at `slug` and
    /// was written by `author_id`. Returns whether a row was removed.
    pub fn delete(
        connection: &mut PgConnection,
        id: i32,
        slug: &str,
        author_id: i32,
    ) -> Result<bool, ApiError> {
        let article_id = match Article::id_of(connection, slug)? {
            Some(article_id) => article_id,
            None => return Ok(false),
        };
        let removed = diesel_delete(
            comments::table
                .filter(comments::id.eq(id))
                .filter(comments::article_id.eq(article_id))
                .filter(comments::user_id.eq(author_id)),
        )
        .execute(connection)?;
        if removed == 0 {
            tracing::warn!(comment_id = id, author_id, "comment delete matched nothing");
        }
        Ok(removed > 0)
    }

    /// Author of comment `id` on the article at `slug`, if such a comment exists.
    pub fn author_of(
        connection: &mut PgConnection,
        id: i32,
        slug: &str,
    ) -> Result<Option<i32>, ApiError> {
        let article_id = match Article::id_of(connection, slug)? {
            Some(article_id) => article_id,
            None => return Ok(None),
        };
        let author = comments::table
            .filter(comments::id.eq(id))
            .filter(comments::article_id.eq(article_id))
            .select(comments::user_id)
            .first::<i32>(connection)
            .optional()?;
        Ok(author)
    }
}

#[post("/articles/<slug>/comments", data = "<details>", format = "json")]
pub async fn add(
    current: Viewer,
    conn: DbConnection,
    slug: String,
    details: Json<CommentContainer<CommentBody>>,
) -> ApiResult<CommentContainer<Comment>> {
    let details = details.into_inner().comment.validate()?;
    let comment = conn
        .run(move |c| Comment::create(c, &slug, current.id(), &details.body))
        .await?;
    Ok(Json(CommentContainer { comment }))
}

#[get("/articles/<slug>/comments")]
pub async fn get(
    viewer: Option<Viewer>,
    conn: DbConnection,
    slug: String,
) -> ApiResult<CommentsContainer<Vec<Comment>>> {
    let viewer = viewer.map(Viewer::id);
    let comments = conn
        .run(move |c| Comment::list(c, &slug, viewer))
        .await?;
    Ok(Json(CommentsContainer { comments }))
}

#[delete("/articles/<slug>/comments/<id>")]
pub async fn delete(
    current: Viewer,
    conn: DbConnection,
    slug: String,
    id: i32,
) -> ApiResult<Value> {
    conn.run(move |c| {
        if Comment::delete(c, id, &slug, current.id())? {
            return Ok(());
        }
        match Comment::author_of(c, id, &slug)? {
            Some(_) => Err(ApiError::Forbidden),
            None => Err(ApiError::NotFound),
        }
    })
    .await?;
    Ok(Json(json!({ "message": "Comment deleted" })))
}
