use super::query::{ArticleFilters, ArticleQuery, ArticleRow, Page};
use super::utils::generate_slug;
use crate::db::schema::{article_tags, articles, tags};
use crate::profile::Profile;
use crate::types::{ApiError, Validate, ValidationError};
use crate::utils::serialize_date;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::{delete, insert_into, update};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An article projected for one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(skip_serializing)]
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    /// Sorted by name; empty rather than null.
    pub tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: Profile,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Article {
        Article {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            body: row.body,
            tag_list: row.tag_list,
            created_at: row.created_at,
            updated_at: row.updated_at,
            favorited: row.favorited,
            favorites_count: row.favorites_count,
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

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleList {
    pub articles: Vec<Article>,
    /// Matches across all pages, not just the returned slice.
    pub articles_count: i64,
}

impl ArticleList {
    fn from_rows(rows: Vec<ArticleRow>, articles_count: i64) -> ArticleList {
        ArticleList {
            articles: rows.into_iter().map(Article::from).collect(),
            articles_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

impl Validate for NewArticle {
    type Error = ValidationError;
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.title.trim().is_empty() {
            error.add_error("title", "empty title");
        }
        if self.description.trim().is_empty() {
            error.add_error("description", "empty description");
        }
        if self.body.trim().is_empty() {
            error.add_error("body", "empty body");
        }
        error.or_ok(self)
    }
}

impl NewArticle {
    /// Trimmed, non-empty, duplicate free tag names.
    fn tag_names(&self) -> Vec<&str> {
        self.tag_list
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Insertable)]
#[diesel(table_name = articles)]
struct InsertArticle<'a> {
    author_id: i32,
    slug: &'a str,
    title: &'a str,
    description: &'a str,
    body: &'a str,
}

/// Sparse update: absent or blank fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = articles)]
struct ArticleChangeset<'a> {
    slug: Option<String>,
    title: Option<&'a str>,
    description: Option<&'a str>,
    body: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.trim().is_empty())
}

impl ArticlePatch {
    fn changeset(&self, now: DateTime<Utc>) -> ArticleChangeset<'_> {
        let title = present(&self.title);
        ArticleChangeset {
            // a new title means a new public identity
            slug: title.map(generate_slug),
            title,
            description: present(&self.description),
            body: present(&self.body),
            updated_at: now,
        }
    }
}

impl Article {
    pub fn find_by_id(
        connection: &mut PgConnection,
        id: i32,
        viewer: Option<i32>,
    ) -> Result<Option<Article>, ApiError> {
        Article::find_one(connection, ArticleQuery::by_id(id, viewer))
    }

    pub fn find_by_slug(
        connection: &mut PgConnection,
        slug: &str,
        viewer: Option<i32>,
    ) -> Result<Option<Article>, ApiError> {
        Article::find_one(connection, ArticleQuery::by_slug(slug, viewer))
    }

    fn find_one(
        connection: &mut PgConnection,
        query: ArticleQuery,
    ) -> Result<Option<Article>, ApiError> {
        let rows = query.load_rows(connection)?;
        Ok(rows.into_iter().next().map(Article::from))
    }

    pub fn list(
        connection: &mut PgConnection,
        filters: ArticleFilters,
        page: Page,
        viewer: Option<i32>,
    ) -> Result<ArticleList, ApiError> {
        Article::list_by(connection, ArticleQuery::list(filters, page, viewer))
    }

    pub fn list_feed(
        connection: &mut PgConnection,
        viewer: i32,
        page: Page,
    ) -> Result<ArticleList, ApiError> {
        Article::list_by(connection, ArticleQuery::feed(viewer, page))
    }

    /// Runs any composed query, such as one built with
    /// [`ArticleQuery::builder`].
    pub fn list_by(
        connection: &mut PgConnection,
        query: ArticleQuery,
    ) -> Result<ArticleList, ApiError> {
        let (rows, total) = query.load_page(connection)?;
        Ok(ArticleList::from_rows(rows, total))
    }

    /// Inserts the article and links its tags in one transaction. A slug
    /// collision fails the whole operation with `Conflict`.
    pub fn create(
        connection: &mut PgConnection,
        author_id: i32,
        new_article: &NewArticle,
    ) -> Result<Article, ApiError> {
        connection.transaction::<_, ApiError, _>(|conn| {
            let slug = generate_slug(&new_article.title);
            let article_id = insert_into(articles::table)
                .values(&InsertArticle {
                    author_id,
                    slug: &slug,
                    title: &new_article.title,
                    description: &new_article.description,
                    body: &new_article.body,
                })
                .returning(articles::id)
                .get_result::<i32>(conn)?;
            attach_tags(conn, article_id, &new_article.tag_names())?;
            tracing::info!(article_id, author_id, %slug, "created article");
            Article::find_by_id(conn, article_id, Some(author_id))?.ok_or(ApiError::NotFound)
        })
    }

    /// Applies `patch` to the article at `slug` if `author_id` wrote it.
    /// `None` covers both a missing slug and someone else's article; see
    /// [`Article::author_of`].
    pub fn update(
        connection: &mut PgConnection,
        slug: &str,
        author_id: i32,
        patch: &ArticlePatch,
    ) -> Result<Option<Article>, ApiError> {
        let changeset = patch.changeset(Utc::now());
        let updated = update(
            articles::table
                .filter(articles::slug.eq(slug))
                .filter(articles::author_id.eq(author_id)),
        )
        .set(&changeset)
        .returning(articles::id)
        .get_result::<i32>(connection)
        .optional()?;

        match updated {
            Some(article_id) => {
                tracing::info!(article_id, old_slug = slug, new_slug = ?changeset.slug, "updated article");
                Article::find_by_id(connection, article_id, Some(author_id))
            }
            None => Ok(None),
        }
    }

    /// Returns whether a row was removed.
    pub fn delete(
        connection: &mut PgConnection,
        slug: &str,
        author_id: i32,
    ) -> Result<bool, ApiError> {
        let removed = delete(
            articles::table
                .filter(articles::slug.eq(slug))
                .filter(articles::author_id.eq(author_id)),
        )
        .execute(connection)?;
        tracing::info!(slug, author_id, removed, "deleted article");
        Ok(removed > 0)
    }

    /// Author of the article at `slug`, if it exists.
    pub fn author_of(connection: &mut PgConnection, slug: &str) -> Result<Option<i32>, ApiError> {
        let author = articles::table
            .filter(articles::slug.eq(slug))
            .select(articles::author_id)
            .first::<i32>(connection)
            .optional()?;
        Ok(author)
    }

    pub fn id_of(connection: &mut PgConnection, slug: &str) -> Result<Option<i32>, ApiError> {
        let id = articles::table
            .filter(articles::slug.eq(slug))
            .select(articles::id)
            .first::<i32>(connection)
            .optional()?;
        Ok(id)
    }
}

/// Upserts `names` into the tag catalog and links them to the article.
fn attach_tags(
    connection: &mut PgConnection,
    article_id: i32,
    names: &[&str],
) -> Result<(), ApiError> {
    if names.is_empty() {
        return Ok(());
    }
    let new_tags = names
        .iter()
        .map(|name| tags::name.eq(*name))
        .collect::<Vec<_>>();
    insert_into(tags::table)
        .values(new_tags)
        .on_conflict(tags::name)
        .do_nothing()
        .execute(connection)?;

    let tag_ids = tags::table
        .filter(tags::name.eq_any(names.to_vec()))
        .select(tags::id)
        .load::<i32>(connection)?;
    let links = tag_ids
        .into_iter()
        .map(|tag_id| {
            (
                article_tags::article_id.eq(article_id),
                article_tags::tag_id.eq(tag_id),
            )
        })
        .collect::<Vec<_>>();
    insert_into(article_tags::table)
        .values(links)
        .on_conflict_do_nothing()
        .execute(connection)?;
    Ok(())
}
