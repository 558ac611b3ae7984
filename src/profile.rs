use crate::db::schema::follows;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, ValidationError};
use crate::users::models::User;
use crate::users::Viewer;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete, insert_into, select};
use rocket::serde::json::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    profile: Profile,
}

/// A user as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    #[serde(skip_serializing)]
    pub id: i32,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    /// Never true for the viewer's own profile.
    pub following: bool,
}

impl Profile {
    pub fn project(user: User, viewer: Option<i32>, following: bool) -> Profile {
        Profile {
            following: following && viewer.map_or(false, |viewer| viewer != user.id),
            id: user.id,
            username: user.username,
            bio: user.bio,
            image: user.image,
        }
    }

    pub fn load_by_id(
        connection: &mut PgConnection,
        user_id: i32,
        viewer: Option<i32>,
    ) -> Result<Option<Profile>, ApiError> {
        match User::load_by_id(user_id, connection)? {
            Some(user) => Ok(Some(Profile::resolve(connection, user, viewer)?)),
            None => Ok(None),
        }
    }

    pub fn load_by_name(
        connection: &mut PgConnection,
        username: &str,
        viewer: Option<i32>,
    ) -> Result<Option<Profile>, ApiError> {
        match User::load_by_name(username, connection)? {
            Some(user) => Ok(Some(Profile::resolve(connection, user, viewer)?)),
            None => Ok(None),
        }
    }

    fn resolve(
        connection: &mut PgConnection,
        user: User,
        viewer: Option<i32>,
    ) -> Result<Profile, ApiError> {
        let following = is_following(connection, viewer, user.id)?;
        Ok(Profile::project(user, viewer, following))
    }

    /// Idempotent: following someone twice leaves a single relation.
    pub fn follow(
        connection: &mut PgConnection,
        follower_id: i32,
        username: &str,
    ) -> Result<Profile, ApiError> {
        let followed = User::load_by_name(username, connection)?.ok_or(ApiError::NotFound)?;
        if followed.id == follower_id {
            tracing::warn!(follower_id, "rejected self follow");
            return Err(ValidationError::from("username", "cannot follow yourself").into());
        }
        insert_into(follows::table)
            .values((
                follows::follower_id.eq(follower_id),
                follows::followed_id.eq(followed.id),
            ))
            .on_conflict_do_nothing()
            .execute(connection)?;
        tracing::info!(follower_id, followed_id = followed.id, "followed");
        Ok(Profile::project(followed, Some(follower_id), true))
    }

    /// Idempotent: unfollowing someone not followed is a no-op.
    pub fn unfollow(
        connection: &mut PgConnection,
        follower_id: i32,
        username: &str,
    ) -> Result<Profile, ApiError> {
        let followed = User::load_by_name(username, connection)?.ok_or(ApiError::NotFound)?;
        delete(
            follows::table
                .filter(follows::follower_id.eq(follower_id))
                .filter(follows::followed_id.eq(followed.id)),
        )
        .execute(connection)?;
        tracing::info!(follower_id, followed_id = followed.id, "unfollowed");
        Ok(Profile::project(followed, Some(follower_id), false))
    }
}

fn is_following(
    connection: &mut PgConnection,
    viewer: Option<i32>,
    user_id: i32,
) -> QueryResult<bool> {
    match viewer {
        Some(viewer) if viewer != user_id => select(exists(
            follows::table
                .filter(follows::follower_id.eq(viewer))
                .filter(follows::followed_id.eq(user_id)),
        ))
        .get_result::<bool>(connection),
        _ => Ok(false),
    }
}

#[get("/profiles/<name>")]
pub async fn profile(
    viewer: Option<Viewer>,
    connection: DbConnection,
    name: String,
) -> ApiResult<ProfileResponse> {
    let viewer = viewer.map(Viewer::id);
    let profile = connection
        .run(move |c| Profile::load_by_name(c, &name, viewer)?.ok_or(ApiError::NotFound))
        .await?;
    Ok(Json(ProfileResponse { profile }))
}

#[post("/profiles/<name>/follow")]
pub async fn follow(
    current: Viewer,
    connection: DbConnection,
    name: String,
) -> ApiResult<ProfileResponse> {
    let profile = connection
        .run(move |c| Profile::follow(c, current.id(), &name))
        .await?;
    Ok(Json(ProfileResponse { profile }))
}

#[delete("/profiles/<name>/follow")]
pub async fn unfollow(
    current: Viewer,
    connection: DbConnection,
    name: String,
) -> ApiResult<ProfileResponse> {
    let profile = connection
        .run(move |c| Profile::unfollow(c, current.id(), &name))
        .await?;
    Ok(Json(ProfileResponse { profile }))
}
