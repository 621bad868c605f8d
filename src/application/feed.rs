//! Read-side composition of the post listings and the post page.

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::pagination::{PAGE_SIZE, Page, PageWindow};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostScope, PostsRepo, UsersRepo,
};
use crate::domain::entities::{
    AuthorStats, CommentRecord, GroupRecord, PostRecord, UserRecord,
};
use crate::domain::error::DomainError;

/// An author's profile: their posts plus the relationship to the viewer.
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub author: UserRecord,
    pub stats: AuthorStats,
    /// `None` when the viewer is anonymous or is the author.
    pub viewer_follows: Option<bool>,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct PostDetailView {
    pub post: PostRecord,
    pub author: UserRecord,
    pub stats: AuthorStats,
    pub comments: Vec<CommentRecord>,
}

#[derive(Clone)]
pub struct FeedService {
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FeedService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            users,
            groups,
            posts,
            comments,
            follows,
        }
    }

    /// Every post, newest first.
    pub async fn index(&self, raw_page: Option<&str>) -> Result<Page<PostRecord>, AppError> {
        self.page(PostScope::All, raw_page).await
    }

    pub async fn group(
        &self,
        slug: &str,
        raw_page: Option<&str>,
    ) -> Result<(GroupRecord, Page<PostRecord>), AppError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::not_found("group"))?;
        let page = self.page(PostScope::Group(group.id), raw_page).await?;
        Ok((group, page))
    }

    pub async fn profile(
        &self,
        username: &str,
        raw_page: Option<&str>,
        viewer: Option<&UserRecord>,
    ) -> Result<ProfileView, AppError> {
        let author = self.author(username).await?;
        let page = self.page(PostScope::Author(author.id), raw_page).await?;
        let stats = self.author_stats_with_posts(author.id, page.count).await?;

        let viewer_follows = match viewer {
            Some(viewer) if viewer.id != author.id => {
                Some(self.follows.is_following(viewer.id, author.id).await?)
            }
            _ => None,
        };

        Ok(ProfileView {
            author,
            stats,
            viewer_follows,
            page,
        })
    }

    /// Posts by every author `viewer` follows.
    pub async fn follow_index(
        &self,
        viewer: &UserRecord,
        raw_page: Option<&str>,
    ) -> Result<Page<PostRecord>, AppError> {
        self.page(PostScope::FollowedBy(viewer.id), raw_page).await
    }

    /// The post must belong to `username`; a mismatch is reported as missing.
    pub async fn post_detail(
        &self,
        username: &str,
        post_id: i64,
    ) -> Result<PostDetailView, AppError> {
        let (author, post) = self.owned_post(username, post_id).await?;
        let stats = self.author_stats(author.id).await?;
        let comments = self.comments.list_comments(post.id).await?;

        Ok(PostDetailView {
            post,
            author,
            stats,
            comments,
        })
    }

    pub async fn owned_post(
        &self,
        username: &str,
        post_id: i64,
    ) -> Result<(UserRecord, PostRecord), AppError> {
        let author = self.author(username).await?;
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .filter(|post| post.author_id == author.id)
            .ok_or_else(|| DomainError::not_found("post"))?;
        Ok((author, post))
    }

    pub async fn author(&self, username: &str) -> Result<UserRecord, AppError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("user").into())
    }

    pub async fn author_stats(&self, author_id: i64) -> Result<AuthorStats, AppError> {
        let posts = self.posts.count_posts(PostScope::Author(author_id)).await?;
        self.author_stats_with_posts(author_id, posts).await
    }

    async fn author_stats_with_posts(
        &self,
        author_id: i64,
        posts: u64,
    ) -> Result<AuthorStats, AppError> {
        Ok(AuthorStats {
            posts,
            followers: self.follows.count_followers(author_id).await?,
            following: self.follows.count_following(author_id).await?,
        })
    }

    async fn page(
        &self,
        scope: PostScope,
        raw_page: Option<&str>,
    ) -> Result<Page<PostRecord>, AppError> {
        let count = self.posts.count_posts(scope).await?;
        let window = PageWindow::resolve(raw_page, count, PAGE_SIZE);
        if count == 0 {
            return Ok(window.into_page(Vec::new()));
        }
        let items = self
            .posts
            .list_posts(scope, window.offset(), window.limit())
            .await?;
        Ok(window.into_page(items))
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>, AppError> {
        Ok(self.groups.list_groups().await?)
    }
}
