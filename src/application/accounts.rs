//! Signup, login and cookie-session resolution.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::forms::{FormErrors, LoginForm, SignupForm};
use crate::application::password::{hash_password, verify_password};
use crate::application::posts::Submission;
use crate::application::repos::{CreateUserParams, RepoError, SessionsRepo, UsersRepo};
use crate::domain::entities::{SessionRecord, UserRecord};

pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<Submission<UserRecord>, AppError> {
        let clean = match form.clean() {
            Ok(clean) => clean,
            Err(errors) => return Ok(Submission::Rejected(errors)),
        };

        if self
            .users
            .find_user_by_username(&clean.username)
            .await?
            .is_some()
        {
            return Ok(Submission::Rejected(duplicate_username()));
        }

        let password_hash =
            hash_password(&clean.password).map_err(|err| AppError::unexpected(err.to_string()))?;

        let created = self
            .users
            .create_user(CreateUserParams {
                username: clean.username,
                email: clean.email,
                first_name: clean.first_name,
                last_name: clean.last_name,
                password_hash,
            })
            .await;

        match created {
            Ok(user) => {
                info!(target = "yatube::accounts", username = %user.username, "user signed up");
                Ok(Submission::Accepted(user))
            }
            Err(RepoError::Duplicate { .. }) => Ok(Submission::Rejected(duplicate_username())),
            Err(err) => Err(err.into()),
        }
    }

    /// Verifies credentials and opens a session for the user.
    pub async fn login(
        &self,
        form: &LoginForm,
    ) -> Result<Submission<(UserRecord, SessionRecord)>, AppError> {
        let (username, password) = match form.clean() {
            Ok(values) => values,
            Err(errors) => return Ok(Submission::Rejected(errors)),
        };

        let Some(user) = self.users.find_user_by_username(&username).await? else {
            return Ok(Submission::Rejected(invalid_login()));
        };

        let verified = verify_password(&password, &user.password_hash)
            .map_err(|err| AppError::unexpected(err.to_string()))?;
        if !verified {
            return Ok(Submission::Rejected(invalid_login()));
        }

        let now = OffsetDateTime::now_utc();
        let session = SessionRecord {
            token: Uuid::new_v4(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        self.sessions.create_session(session.clone()).await?;

        info!(target = "yatube::accounts", username = %user.username, "user logged in");
        Ok(Submission::Accepted((user, session)))
    }

    pub async fn logout(&self, token: Uuid) -> Result<(), AppError> {
        self.sessions.delete_session(token).await?;
        Ok(())
    }

    /// The signed-in user for a session cookie. Expired sessions are removed.
    pub async fn resolve_session(&self, token: Uuid) -> Result<Option<UserRecord>, AppError> {
        let Some(session) = self.sessions.find_session(token).await? else {
            return Ok(None);
        };

        if session.is_expired(OffsetDateTime::now_utc()) {
            debug!(target = "yatube::accounts", "discarding expired session");
            self.sessions.delete_session(token).await?;
            return Ok(None);
        }

        Ok(self.users.find_user_by_id(session.user_id).await?)
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AppError> {
        Ok(self
            .sessions
            .delete_expired_sessions(OffsetDateTime::now_utc())
            .await?)
    }
}

/// Accepts only same-site absolute paths such as `/new/`.
pub fn local_redirect_target(next: &str) -> Option<&str> {
    let next = next.trim();
    let local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.chars().any(char::is_control);
    local.then_some(next)
}

fn duplicate_username() -> FormErrors {
    let mut errors = FormErrors::new();
    errors.add("username", DUPLICATE_USERNAME);
    errors
}

fn invalid_login() -> FormErrors {
    let mut errors = FormErrors::new();
    errors.add_non_field(INVALID_LOGIN);
    errors
}
