//! Follow relationships between users.

use std::sync::Arc;

use tracing::info;

use crate::application::error::AppError;
use crate::application::repos::{FollowsRepo, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;

/// What a follow or unfollow request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowChange {
    Created,
    Removed,
    Unchanged,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    /// Following oneself or following twice changes nothing.
    pub async fn follow(
        &self,
        follower: &UserRecord,
        username: &str,
    ) -> Result<(UserRecord, FollowChange), AppError> {
        let author = self.author(username).await?;
        if author.id == follower.id {
            return Ok((author, FollowChange::Unchanged));
        }

        let change = if self.follows.follow(follower.id, author.id).await? {
            info!(
                target = "yatube::social",
                follower = %follower.username,
                author = %author.username,
                "follow created"
            );
            FollowChange::Created
        } else {
            FollowChange::Unchanged
        };
        Ok((author, change))
    }

    pub async fn unfollow(
        &self,
        follower: &UserRecord,
        username: &str,
    ) -> Result<(UserRecord, FollowChange), AppError> {
        let author = self.author(username).await?;
        if author.id == follower.id {
            return Ok((author, FollowChange::Unchanged));
        }

        let change = if self.follows.unfollow(follower.id, author.id).await? {
            info!(
                target = "yatube::social",
                follower = %follower.username,
                author = %author.username,
                "follow removed"
            );
            FollowChange::Removed
        } else {
            FollowChange::Unchanged
        };
        Ok((author, change))
    }

    async fn author(&self, username: &str) -> Result<UserRecord, AppError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("user").into())
    }
}
