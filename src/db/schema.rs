table! {
    articles (id) {
        id -> Int4,
        author_id -> Int4,
        slug -> Text,
        title -> Text,
        description -> Text,
        body -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    article_tags (article_id, tag_id) {
        article_id -> Int4,
        tag_id -> Int4,
    }
}

table! {
    comments (id) {
        id -> Int4,
        article_id -> Int4,
        user_id -> Int4,
        body -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

table! {
    favorites (user_id, article_id) {
        user_id -> Int4,
        article_id -> Int4,
    }
}

table! {
    follows (follower_id, followed_id) {
        follower_id -> Int4,
        followed_id -> Int4,
    }
}

table! {
    tags (id) {
        id -> Int4,
        name -> Text,
    }
}

table! {
    users (id) {
        id -> Int4,
        username -> Text,
        email -> Text,
        bio -> Nullable<Text>,
        image -> Nullable<Text>,
    }
}

joinable!(articles -> users (author_id));
joinable!(article_tags -> articles (article_id));
joinable!(article_tags -> tags (tag_id));
joinable!(comments -> articles (article_id));
joinable!(comments -> users (user_id));
joinable!(favorites -> articles (article_id));
joinable!(favorites -> users (user_id));

allow_tables_to_appear_in_same_query!(
    articles,
    article_tags,
    comments,
    favorites,
    follows,
    tags,
    users,
);
