//! Composition of the single read statement behind every article lookup.
//!
//! [`ArticleQuery`] renders one parameterized `SELECT` that joins the author,
//! applies whichever filters are active and computes all viewer-relative
//! columns as correlated subqueries, so a page of articles never needs
//! follow-up queries.

use crate::types::ValidationError;
use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::query_builder::{AstPass, Query, QueryFragment, QueryId};
use diesel::sql_types::{Array, BigInt, Bool, Integer, Nullable, Text, Timestamptz, Untyped};
use diesel::{PgConnection, QueryResult, QueryableByName, RunQueryDsl};

pub const DEFAULT_LIMIT: i64 = 20;

static SELECT_RICH_ARTICLE: &str = "SELECT a.id, a.slug, a.title, a.description, a.body, \
     a.created_at, a.updated_at, \
     u.id AS author_id, u.username AS author_username, u.bio AS author_bio, \
     u.image AS author_image, \
     (SELECT COUNT(*) FROM favorites f WHERE f.article_id = a.id) AS favorites_count, \
     COALESCE((SELECT ARRAY_AGG(t.name ORDER BY t.name) \
               FROM article_tags art INNER JOIN tags t ON t.id = art.tag_id \
               WHERE art.article_id = a.id), ARRAY[]::TEXT[]) AS tag_list, \
     COUNT(*) OVER () AS total, ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Page {
        Page {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Fills in the defaults (20, 0) and rejects negative values.
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Result<Page, ValidationError> {
        let page = Page {
            limit: limit.unwrap_or(DEFAULT_LIMIT),
            offset: offset.unwrap_or(0),
        };
        let mut error = ValidationError::default();
        if page.limit < 0 {
            error.add_error("limit", "limit must not be negative");
        }
        if page.offset < 0 {
            error.add_error("offset", "offset must not be negative");
        }
        error.or_ok(page)
    }
}

/// List filters; every one that is set narrows the result further.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilters {
    pub tag: Option<String>,
    /// Author username.
    pub author: Option<String>,
    /// Username of a user who favorited the article.
    pub favorited_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    Id(i32),
    Slug(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    lookup: Option<Lookup>,
    filters: ArticleFilters,
    feed: bool,
    page: Page,
    viewer: Option<i32>,
}

impl ArticleQuery {
    pub fn builder() -> ArticleQueryBuilder {
        ArticleQueryBuilder::default()
    }

    pub fn by_id(id: i32, viewer: Option<i32>) -> ArticleQuery {
        ArticleQuery {
            lookup: Some(Lookup::Id(id)),
            filters: ArticleFilters::default(),
            feed: false,
            page: Page::default(),
            viewer,
        }
    }

    pub fn by_slug(slug: &str, viewer: Option<i32>) -> ArticleQuery {
        ArticleQuery {
            lookup: Some(Lookup::Slug(slug.to_owned())),
            ..ArticleQuery::by_id(0, viewer)
        }
    }

    pub fn list(filters: ArticleFilters, page: Page, viewer: Option<i32>) -> ArticleQuery {
        ArticleQuery {
            lookup: None,
            filters,
            feed: false,
            page,
            viewer,
        }
    }

    /// Articles written by authors `viewer` follows.
    pub fn feed(viewer: i32, page: Page) -> ArticleQuery {
        ArticleQuery {
            feed: true,
            ..ArticleQuery::list(ArticleFilters::default(), page, Some(viewer))
        }
    }

    pub fn load_rows(self, conn: &mut PgConnection) -> QueryResult<Vec<ArticleRow>> {
        tracing::debug!(query = ?self, "loading articles");
        RunQueryDsl::load::<ArticleRow>(self, conn)
    }

    pub fn count(&self) -> ArticleCount {
        ArticleCount(self.clone())
    }

    /// One page of rows plus the number of matches across all pages. The
    /// window total rides on the returned rows; an empty page that might
    /// still have matches elsewhere falls back to a separate count.
    pub fn load_page(self, conn: &mut PgConnection) -> QueryResult<(Vec<ArticleRow>, i64)> {
        let count = self.count();
        let maybe_elsewhere = self.page.limit == 0 || self.page.offset > 0;
        let rows = self.load_rows(conn)?;
        let total = match rows.first() {
            Some(row) => row.total,
            None if maybe_elsewhere => {
                tracing::debug!(query = ?count, "counting articles past the page");
                RunQueryDsl::get_result::<CountRow>(count, conn)?.total
            }
            None => 0,
        };
        Ok((rows, total))
    }
}

/// Collects optional inputs and checks that they combine into a valid query.
#[derive(Debug, Clone, Default)]
pub struct ArticleQueryBuilder {
    id: Option<i32>,
    slug: Option<String>,
    filters: ArticleFilters,
    feed: bool,
    page: Page,
    viewer: Option<i32>,
}

impl ArticleQueryBuilder {
    pub fn id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn slug<S: Into<String>>(mut self, slug: S) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.filters.tag = Some(tag.into());
        self
    }

    pub fn author<S: Into<String>>(mut self, author: S) -> Self {
        self.filters.author = Some(author.into());
        self
    }

    pub fn favorited_by<S: Into<String>>(mut self, username: S) -> Self {
        self.filters.favorited_by = Some(username.into());
        self
    }

    pub fn filters(mut self, filters: ArticleFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn feed(mut self, feed: bool) -> Self {
        self.feed = feed;
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn viewer(mut self, viewer: Option<i32>) -> Self {
        self.viewer = viewer;
        self
    }

    pub fn build(self) -> Result<ArticleQuery, ValidationError> {
        let mut error = ValidationError::default();
        let lookup = match (self.id, self.slug) {
            (Some(_), Some(_)) => {
                error.add_error("slug", "id and slug lookups are mutually exclusive");
                None
            }
            (Some(id), None) => Some(Lookup::Id(id)),
            (None, Some(slug)) => Some(Lookup::Slug(slug)),
            (None, None) => None,
        };
        if self.feed && self.viewer.is_none() {
            error.add_error("feed", "feed requires an authenticated viewer");
        }
        if self.page.limit < 0 || self.page.offset < 0 {
            error.add_error("page", "limit and offset must not be negative");
        }
        error.or_ok(ArticleQuery {
            lookup,
            filters: self.filters,
            feed: self.feed,
            page: self.page,
            viewer: self.viewer,
        })
    }
}

fn push_condition(out: &mut AstPass<'_, '_, Pg>, has_where: &mut bool) {
    out.push_sql(if *has_where { " AND " } else { " WHERE " });
    *has_where = true;
}

impl ArticleQuery {
    /// Lookup, filters and feed restriction, shared by the page and the count.
    fn push_where<'b>(&'b self, out: &mut AstPass<'_, 'b, Pg>) -> QueryResult<()> {
        let mut has_where = false;
        match &self.lookup {
            Some(Lookup::Id(id)) => {
                push_condition(out, &mut has_where);
                out.push_sql("a.id = ");
                out.push_bind_param::<Integer, _>(id)?;
            }
            Some(Lookup::Slug(slug)) => {
                push_condition(out, &mut has_where);
                out.push_sql("a.slug = ");
                out.push_bind_param::<Text, _>(slug)?;
            }
            None => {}
        }

        if let Some(tag) = &self.filters.tag {
            push_condition(out, &mut has_where);
            out.push_sql(
                "EXISTS (SELECT 1 FROM article_tags fat INNER JOIN tags ft ON ft.id = fat.tag_id \
                 WHERE fat.article_id = a.id AND ft.name = ",
            );
            out.push_bind_param::<Text, _>(tag)?;
            out.push_sql(")");
        }

        if let Some(author) = &self.filters.author {
            push_condition(out, &mut has_where);
            out.push_sql("u.username = ");
            out.push_bind_param::<Text, _>(author)?;
        }

        if let Some(username) = &self.filters.favorited_by {
            push_condition(out, &mut has_where);
            out.push_sql(
                "EXISTS (SELECT 1 FROM favorites ff INNER JOIN users fu ON fu.id = ff.user_id \
                 WHERE ff.article_id = a.id AND fu.username = ",
            );
            out.push_bind_param::<Text, _>(username)?;
            out.push_sql(")");
        }

        if self.feed {
            push_condition(out, &mut has_where);
            out.push_sql(
                "EXISTS (SELECT 1 FROM follows ffl \
                 WHERE ffl.followed_id = a.author_id AND ffl.follower_id = ",
            );
            out.push_bind_param::<Nullable<Integer>, _>(&self.viewer)?;
            out.push_sql(")");
        }
        Ok(())
    }
}

impl QueryFragment<Pg> for ArticleQuery {
    fn walk_ast<'b>(&'b self, mut out: AstPass<'_, 'b, Pg>) -> QueryResult<()> {
        // the SQL text depends on which filters are set
        out.unsafe_to_cache_prepared();

        out.push_sql(SELECT_RICH_ARTICLE);
        out.push_sql(
            "EXISTS (SELECT 1 FROM favorites vf \
             WHERE vf.article_id = a.id AND vf.user_id = ",
        );
        out.push_bind_param::<Nullable<Integer>, _>(&self.viewer)?;
        out.push_sql(
            ") AS favorited, \
             EXISTS (SELECT 1 FROM follows vfl \
             WHERE vfl.followed_id = a.author_id AND vfl.follower_id = ",
        );
        out.push_bind_param::<Nullable<Integer>, _>(&self.viewer)?;
        out.push_sql(") AS following FROM articles a INNER JOIN users u ON u.id = a.author_id");
        self.push_where(&mut out)?;

        out.push_sql(" ORDER BY a.created_at DESC, a.id DESC");
        if self.lookup.is_some() {
            out.push_sql(" LIMIT 1");
        } else {
            out.push_sql(" LIMIT ");
            out.push_bind_param::<BigInt, _>(&self.page.limit)?;
            out.push_sql(" OFFSET ");
            out.push_bind_param::<BigInt, _>(&self.page.offset)?;
        }
        Ok(())
    }
}

/// `COUNT(*)` over the rows an [`ArticleQuery`] matches, ignoring its page.
#[derive(Debug, Clone)]
pub struct ArticleCount(ArticleQuery);

impl QueryFragment<Pg> for ArticleCount {
    fn walk_ast<'b>(&'b self, mut out: AstPass<'_, 'b, Pg>) -> QueryResult<()> {
        out.unsafe_to_cache_prepared();
        out.push_sql(
            "SELECT COUNT(*) AS total FROM articles a INNER JOIN users u ON u.id = a.author_id",
        );
        self.0.push_where(&mut out)
    }
}

impl QueryId for ArticleCount {
    type QueryId = ();
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl Query for ArticleCount {
    type SqlType = Untyped;
}

impl RunQueryDsl<PgConnection> for ArticleCount {}

#[derive(Debug, QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

impl QueryId for ArticleQuery {
    type QueryId = ();
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl Query for ArticleQuery {
    type SqlType = Untyped;
}

impl RunQueryDsl<PgConnection> for ArticleQuery {}

/// One row of [`ArticleQuery`]; `total` is the number of rows matching the
/// filters before `LIMIT`/`OFFSET`.
#[derive(Debug, QueryableByName)]
pub struct ArticleRow {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub slug: String,
    #[diesel(sql_type = Text)]
    pub title: String,
    #[diesel(sql_type = Text)]
    pub description: String,
    #[diesel(sql_type = Text)]
    pub body: String,
    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,
    #[diesel(sql_type = Integer)]
    pub author_id: i32,
    #[diesel(sql_type = Text)]
    pub author_username: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub author_bio: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub author_image: Option<String>,
    #[diesel(sql_type = BigInt)]
    pub favorites_count: i64,
    #[diesel(sql_type = Array<Text>)]
    pub tag_list: Vec<String>,
    #[diesel(sql_type = BigInt)]
    pub total: i64,
    #[diesel(sql_type = Bool)]
    pub favorited: bool,
    #[diesel(sql_type = Bool)]
    pub following: bool,
}
