//! In-memory repositories and request helpers shared by the router tests.
#![allow(dead_code)]

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use yatube::application::password::hash_password;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GroupsRepo, PostScope, PostsRepo, PostsWriteRepo, RepoError, SessionsRepo,
    UpdatePostParams, UsersRepo,
};
use yatube::cache::{FragmentCache, FragmentCacheConfig};
use yatube::domain::entities::{
    CommentRecord, GroupRecord, GroupRef, PostRecord, SessionRecord, UserRecord,
};
use yatube::infra::http::{HealthProbe, HttpOptions, HttpState, SessionCookie, build_router};
use yatube::infra::uploads::MediaStorage;

pub const COOKIE_NAME: &str = "yatube_session";
pub const PASSWORD: &str = "correct-horse-9";
pub const BOUNDARY: &str = "yatube-test-boundary";

/// A 1x1 transparent GIF.
pub const ONE_PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    text: String,
    image: Option<String>,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<CommentRecord>,
    follows: Vec<(i64, i64)>,
    sessions: Vec<SessionRecord>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn materialize(&self, post: &StoredPost) -> Result<PostRecord, RepoError> {
        let author = self
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .ok_or(RepoError::NotFound)?;
        let group = post.group_id.and_then(|id| {
            self.groups.iter().find(|group| group.id == id).map(|group| GroupRef {
                id: group.id,
                slug: group.slug.clone(),
                title: group.title.clone(),
            })
        });
        Ok(PostRecord {
            id: post.id,
            text: post.text.clone(),
            image: post.image.clone(),
            pub_date: post.pub_date,
            author_id: post.author_id,
            author_username: author.username.clone(),
            group,
        })
    }

    fn in_scope(&self, post: &StoredPost, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(id) => post.group_id == Some(id),
            PostScope::Author(id) => post.author_id == id,
            PostScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|(user, author)| *user == user_id && *author == post.author_id),
        }
    }
}

/// Repository backend kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryRepos {
    state: Mutex<MemoryState>,
    reject_post_writes: AtomicBool,
}

impl MemoryRepos {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory repository lock")
    }

    /// Makes every later post insert or update fail with a persistence error.
    pub fn reject_post_writes(&self) {
        self.reject_post_writes.store(true, Ordering::SeqCst);
    }

    fn check_post_write(&self) -> Result<(), RepoError> {
        if self.reject_post_writes.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("post writes rejected"));
        }
        Ok(())
    }

    pub fn post_count(&self) -> usize {
        self.state().posts.len()
    }

    pub fn comment_count(&self) -> usize {
        self.state().comments.len()
    }

    pub fn follow_count(&self) -> usize {
        self.state().follows.len()
    }

    pub fn post(&self, id: i64) -> PostRecord {
        let state = self.state();
        let stored = state
            .posts
            .iter()
            .find(|post| post.id == id)
            .expect("post exists");
        state.materialize(stored).expect("post materializes")
    }

    pub fn latest_post(&self) -> PostRecord {
        let state = self.state();
        let stored = state
            .posts
            .iter()
            .max_by_key(|post| post.id)
            .expect("at least one post");
        state.materialize(stored).expect("post materializes")
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state();
        if state.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: state.next_id(),
            username: params.username,
            email: params.email,
            first_name: params.first_name,
            last_name: params.last_name,
            password_hash: params.password_hash,
            date_joined: OffsetDateTime::now_utc(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.state().users.iter().find(|user| user.id == id).cloned())
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepos {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.state().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .state()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .state()
            .groups
            .iter()
            .find(|group| group.id == id)
            .cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state();
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "post_groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: state.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let state = self.state();
        Ok(state
            .posts
            .iter()
            .filter(|post| state.in_scope(post, scope))
            .count() as u64)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state();
        let mut posts: Vec<&StoredPost> = state
            .posts
            .iter()
            .filter(|post| state.in_scope(post, scope))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|post| state.materialize(post))
            .collect()
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state();
        state
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| state.materialize(post))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.check_post_write()?;
        let mut state = self.state();
        let post = StoredPost {
            id: state.next_id(),
            text: params.text,
            image: params.image,
            pub_date: params.pub_date,
            author_id: params.author_id,
            group_id: params.group_id,
        };
        state.posts.push(post.clone());
        state.materialize(&post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        self.check_post_write()?;
        let mut state = self.state();
        let stored = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        stored.text = params.text;
        stored.group_id = params.group_id;
        stored.image = params.image;
        stored.pub_date = params.pub_date;
        let updated = stored.clone();
        state.materialize(&updated)
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .state()
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state();
        let author_username = state
            .users
            .iter()
            .find(|user| user.id == params.author_id)
            .map(|user| user.username.clone())
            .ok_or(RepoError::NotFound)?;
        let comment = CommentRecord {
            id: state.next_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            author_username,
            text: params.text,
            created: params.created,
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepos {
    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state();
        if state.follows.contains(&(user_id, author_id)) {
            return Ok(false);
        }
        state.follows.push((user_id, author_id));
        Ok(true)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state();
        let before = state.follows.len();
        state.follows.retain(|pair| *pair != (user_id, author_id));
        Ok(state.follows.len() != before)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.state().follows.contains(&(user_id, author_id)))
    }

    async fn count_followers(&self, author_id: i64) -> Result<u64, RepoError> {
        Ok(self
            .state()
            .follows
            .iter()
            .filter(|(_, author)| *author == author_id)
            .count() as u64)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64, RepoError> {
        Ok(self
            .state()
            .follows
            .iter()
            .filter(|(user, _)| *user == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepos {
    async fn create_session(&self, session: SessionRecord) -> Result<(), RepoError> {
        self.state().sessions.push(session);
        Ok(())
    }

    async fn find_session(&self, token: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self
            .state()
            .sessions
            .iter()
            .find(|session| session.token == token)
            .cloned())
    }

    async fn delete_session(&self, token: Uuid) -> Result<(), RepoError> {
        self.state().sessions.retain(|session| session.token != token);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut state = self.state();
        let before = state.sessions.len();
        state.sessions.retain(|session| !session.is_expired(now));
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl HealthProbe for MemoryRepos {
    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A router wired to in-memory repositories and a temporary media directory.
pub struct TestApp {
    pub router: Router,
    pub repos: Arc<MemoryRepos>,
    pub fragments: Arc<FragmentCache>,
    pub media_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
    }
}

/// One part of a `multipart/form-data` body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(FragmentCacheConfig::default())
    }

    pub fn with_cache(config: FragmentCacheConfig) -> Self {
        let repos = Arc::new(MemoryRepos::default());
        let media_dir = tempfile::tempdir().expect("temporary media directory");
        let media = Arc::new(
            MediaStorage::new(media_dir.path().to_path_buf()).expect("media storage"),
        );
        let fragments = Arc::new(FragmentCache::new(config));
        let options = HttpOptions {
            session_cookie: SessionCookie {
                name: COOKIE_NAME.to_string(),
                secure: false,
                ttl: time::Duration::days(14),
            },
            max_request_bytes: 5 * 1024 * 1024,
        };
        let state =
            HttpState::from_repositories(repos.clone(), media, fragments.clone(), options);

        Self {
            router: build_router(state),
            repos,
            fragments,
            media_dir,
        }
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        self.repos
            .create_user(CreateUserParams {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: hash_password(PASSWORD).expect("hash password"),
            })
            .await
            .expect("create user")
    }

    /// Opens a session for `user` and returns the `Cookie` header value.
    pub async fn sign_in(&self, user: &UserRecord) -> String {
        let now = OffsetDateTime::now_utc();
        let token = Uuid::new_v4();
        self.repos
            .create_session(SessionRecord {
                token,
                user_id: user.id,
                created_at: now,
                expires_at: now + time::Duration::hours(1),
            })
            .await
            .expect("create session");
        format!("{COOKIE_NAME}={token}")
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        self.repos
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug: slug.to_string(),
                description: format!("All about {title}"),
            })
            .await
            .expect("create group")
    }

    pub async fn post(&self, author: &UserRecord, text: &str, group: Option<&GroupRecord>) -> PostRecord {
        self.repos
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|group| group.id),
                image: None,
                pub_date: OffsetDateTime::now_utc(),
            })
            .await
            .expect("create post")
    }

    /// Number of files under the post image directory.
    pub fn stored_image_count(&self) -> usize {
        std::fs::read_dir(self.media_dir.path().join("posts"))
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request should build"))
            .await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(
            builder
                .body(Body::from(body.to_string()))
                .expect("request should build"),
        )
        .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        parts: &[Part<'_>],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(
            builder
                .body(Body::from(multipart_body(parts)))
                .expect("request should build"),
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
