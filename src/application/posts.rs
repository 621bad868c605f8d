//! Write-side post workflows: publishing, editing and commenting.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::error::AppError;
use crate::application::forms::{
    CleanPost, CommentForm, FormErrors, INVALID_GROUP, ImageChange, PostForm,
};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsWriteRepo,
    UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;
use crate::infra::uploads::MediaStorage;

const SOURCE: &str = "application::posts::PostService";

/// Result of a form submission that passed request-level checks.
#[derive(Debug, Clone)]
pub enum Submission<T> {
    Accepted(T),
    Rejected(FormErrors),
}

#[derive(Clone)]
pub struct PostService {
    groups: Arc<dyn GroupsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    media: Arc<MediaStorage>,
}

impl PostService {
    pub fn new(
        groups: Arc<dyn GroupsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        media: Arc<MediaStorage>,
    ) -> Self {
        Self {
            groups,
            writer,
            comments,
            media,
        }
    }

    pub async fn create(
        &self,
        author: &UserRecord,
        form: &PostForm,
    ) -> Result<Submission<PostRecord>, AppError> {
        let clean = match self.clean(form).await? {
            Ok(clean) => clean,
            Err(errors) => return Ok(Submission::Rejected(errors)),
        };

        let image = match clean.image {
            ImageChange::Replace(upload) => Some(
                self.media
                    .save_post_image(&upload.filename, upload.extension, upload.bytes)
                    .await
                    .map_err(InfraError::from)?,
            ),
            ImageChange::Keep | ImageChange::Clear => None,
        };

        let created = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: clean.text,
                group_id: clean.group_id,
                image: image.clone(),
                pub_date: OffsetDateTime::now_utc(),
            })
            .await;
        let post = match created {
            Ok(post) => post,
            Err(err) => {
                self.discard_image(image.as_deref(), "failed to remove image of unsaved post")
                    .await;
                return Err(err.into());
            }
        };

        info!(
            target = "yatube::posts",
            post_id = post.id,
            author = %author.username,
            "post published"
        );
        Ok(Submission::Accepted(post))
    }

    /// Replaces text, group and image and moves the post to the top of every feed.
    pub async fn edit(
        &self,
        editor: &UserRecord,
        post: &PostRecord,
        form: &PostForm,
    ) -> Result<Submission<PostRecord>, AppError> {
        if post.author_id != editor.id {
            return Err(DomainError::not_author("edit post").into());
        }

        let clean = match self.clean(form).await? {
            Ok(clean) => clean,
            Err(errors) => return Ok(Submission::Rejected(errors)),
        };

        let (image, saved, replaced) = match clean.image {
            ImageChange::Keep => (post.image.clone(), None, None),
            ImageChange::Clear => (None, None, post.image.clone()),
            ImageChange::Replace(upload) => {
                let stored = self
                    .media
                    .save_post_image(&upload.filename, upload.extension, upload.bytes)
                    .await
                    .map_err(InfraError::from)?;
                (Some(stored.clone()), Some(stored), post.image.clone())
            }
        };

        let updated = match self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                text: clean.text,
                group_id: clean.group_id,
                image,
                pub_date: OffsetDateTime::now_utc(),
            })
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                self.discard_image(saved.as_deref(), "failed to remove image of unsaved edit")
                    .await;
                return Err(err.into());
            }
        };

        self.discard_image(replaced.as_deref(), "failed to remove replaced image")
            .await;

        info!(
            target = "yatube::posts",
            post_id = updated.id,
            author = %editor.username,
            "post edited"
        );
        Ok(Submission::Accepted(updated))
    }

    /// Blank comments are dropped without touching storage.
    pub async fn comment(
        &self,
        author: &UserRecord,
        post: &PostRecord,
        form: &CommentForm,
    ) -> Result<Option<CommentRecord>, AppError> {
        let Ok(text) = form.clean() else {
            return Ok(None);
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text,
                created: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(
            target = "yatube::posts",
            post_id = post.id,
            comment_id = comment.id,
            author = %author.username,
            "comment added"
        );
        Ok(Some(comment))
    }

    /// Best-effort removal; storage errors are only logged.
    async fn discard_image(&self, path: Option<&str>, message: &'static str) {
        let Some(path) = path else {
            return;
        };
        if let Err(err) = self.media.delete(path).await {
            warn!(
                target = "yatube::posts",
                source = SOURCE,
                path = %path,
                error = %err,
                "{message}"
            );
        }
    }

    async fn clean(&self, form: &PostForm) -> Result<Result<CleanPost, FormErrors>, AppError> {
        let mut errors = match form.clean() {
            Ok(clean) => {
                let Some(group_id) = clean.group_id else {
                    return Ok(Ok(clean));
                };
                if self.groups.find_group_by_id(group_id).await?.is_some() {
                    return Ok(Ok(clean));
                }
                FormErrors::new()
            }
            Err(errors) => return Ok(Err(errors)),
        };
        errors.add("group", INVALID_GROUP);
        Ok(Err(errors))
    }
}
