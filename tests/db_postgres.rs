//! Repository behaviour against a real Postgres. Needs `DATABASE_URL`.

use std::collections::HashSet;

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GroupsRepo, PostScope, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo,
    UpdatePostParams, UsersRepo,
};
use yatube::domain::entities::{SessionRecord, UserRecord};
use yatube::infra::db::PostgresRepositories;

async fn user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "$argon2id$placeholder".to_string(),
        })
        .await
        .expect("create user")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn listing_indexes_exist(pool: PgPool) {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' AND tablename = 'posts'",
    )
    .fetch_all(&pool)
    .await
    .expect("fetch post indexes");

    let indexes: HashSet<String> = rows.into_iter().collect();
    for name in [
        "posts_pub_date_idx",
        "posts_author_pub_date_idx",
        "posts_group_pub_date_idx",
    ] {
        assert!(indexes.contains(name), "missing {name}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn duplicate_username_maps_to_duplicate(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    user(&repos, "leo").await;

    let err = repos
        .create_user(CreateUserParams {
            username: "leo".to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "x".to_string(),
        })
        .await
        .expect_err("duplicate username");
    assert!(matches!(err, RepoError::Duplicate { .. }), "{err:?}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn posts_are_scoped_and_ordered_newest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let max = user(&repos, "max").await;
    let group = repos
        .create_group(CreateGroupParams {
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        })
        .await
        .expect("create group");

    let now = OffsetDateTime::now_utc();
    let older = repos
        .create_post(CreatePostParams {
            author_id: leo.id,
            text: "older".to_string(),
            group_id: Some(group.id),
            image: None,
            pub_date: now - Duration::minutes(5),
        })
        .await
        .expect("create post");
    let newer = repos
        .create_post(CreatePostParams {
            author_id: max.id,
            text: "newer".to_string(),
            group_id: None,
            image: Some("posts/a.gif".to_string()),
            pub_date: now,
        })
        .await
        .expect("create post");

    let all = repos.list_posts(PostScope::All, 0, 10).await.expect("list");
    let ids: Vec<i64> = all.iter().map(|post| post.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
    assert_eq!(all[1].group.as_ref().map(|g| g.slug.as_str()), Some("cats"));
    assert_eq!(all[0].author_username, "max");

    assert_eq!(repos.count_posts(PostScope::Group(group.id)).await.expect("count"), 1);
    assert_eq!(repos.count_posts(PostScope::Author(max.id)).await.expect("count"), 1);

    let moved = repos
        .update_post(UpdatePostParams {
            id: older.id,
            text: "moved".to_string(),
            group_id: None,
            image: None,
            pub_date: now + Duration::minutes(1),
        })
        .await
        .expect("update post");
    assert!(moved.group.is_none());
    assert_eq!(repos.count_posts(PostScope::Group(group.id)).await.expect("count"), 0);

    let first = repos.list_posts(PostScope::All, 0, 1).await.expect("list");
    assert_eq!(first[0].id, older.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn follows_are_unique_and_feed_the_follow_scope(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let reader = user(&repos, "reader").await;
    let author = user(&repos, "author").await;
    let stranger = user(&repos, "stranger").await;

    for (who, text) in [(&author, "followed"), (&stranger, "unrelated")] {
        repos
            .create_post(CreatePostParams {
                author_id: who.id,
                text: text.to_string(),
                group_id: None,
                image: None,
                pub_date: OffsetDateTime::now_utc(),
            })
            .await
            .expect("create post");
    }

    assert!(repos.follow(reader.id, author.id).await.expect("follow"));
    assert!(!repos.follow(reader.id, author.id).await.expect("follow again"));
    assert!(repos.is_following(reader.id, author.id).await.expect("check"));
    assert_eq!(repos.count_followers(author.id).await.expect("count"), 1);
    assert_eq!(repos.count_following(reader.id).await.expect("count"), 1);

    let feed = repos
        .list_posts(PostScope::FollowedBy(reader.id), 0, 10)
        .await
        .expect("feed");
    let texts: Vec<&str> = feed.iter().map(|post| post.text.as_str()).collect();
    assert_eq!(texts, vec!["followed"]);

    // Self-follows are refused by FollowService; the table stores any pair.
    assert!(repos.follow(reader.id, reader.id).await.expect("self pair stored"));
    assert!(repos.unfollow(reader.id, reader.id).await.expect("self pair removed"));

    assert!(repos.unfollow(reader.id, author.id).await.expect("unfollow"));
    assert!(!repos.unfollow(reader.id, author.id).await.expect("unfollow again"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn comments_come_back_oldest_first(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let post = repos
        .create_post(CreatePostParams {
            author_id: leo.id,
            text: "post".to_string(),
            group_id: None,
            image: None,
            pub_date: OffsetDateTime::now_utc(),
        })
        .await
        .expect("create post");

    let now = OffsetDateTime::now_utc();
    for (offset, text) in [(2, "second"), (1, "first")] {
        let comment = repos
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: leo.id,
                text: text.to_string(),
                created: now - Duration::minutes(3 - offset),
            })
            .await
            .expect("create comment");
        assert_eq!(comment.author_username, "leo");
    }

    let texts: Vec<String> = repos
        .list_comments(post.id)
        .await
        .expect("list comments")
        .into_iter()
        .map(|comment| comment.text)
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn expired_sessions_are_purged(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = user(&repos, "leo").await;
    let now = OffsetDateTime::now_utc();

    let live = Uuid::new_v4();
    let stale = Uuid::new_v4();
    for (token, expires_at) in [(live, now + Duration::hours(1)), (stale, now - Duration::hours(1))] {
        repos
            .create_session(SessionRecord {
                token,
                user_id: leo.id,
                created_at: now - Duration::hours(2),
                expires_at,
            })
            .await
            .expect("create session");
    }

    assert_eq!(repos.delete_expired_sessions(now).await.expect("purge"), 1);
    assert!(repos.find_session(live).await.expect("find").is_some());
    assert!(repos.find_session(stale).await.expect("find").is_none());
}
