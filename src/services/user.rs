//! User service
//!
//! Implements business logic for user management:
//! - Registration with form validation, then automatic login
//! - Login/logout with signed session tokens
//! - Resolving a session token back to its user
//! - Bootstrapping the staff account from configuration

use crate::config::AdminConfig;
use crate::db::is_unique_violation;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::session_token::SessionSigner;
use crate::services::validation::{self, FormErrors};
use anyhow::Context;
use std::sync::Arc;

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const EMAIL_TAKEN: &str = "A user with that email already exists.";
const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// One or more form fields are invalid
    #[error("Validation error: {0}")]
    ValidationError(#[from] FormErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    signer: SessionSigner,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        signer: SessionSigner,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            signer,
        }
    }

    /// Register a new member account.
    ///
    /// Every field problem is reported at once. Usernames and emails are
    /// unique ignoring case.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let mut errors = FormErrors::new();

        let username = errors.check("username", validation::validate_username(&input.username));
        let email = errors.check("email", validation::validate_email(&input.email));
        if let Err(messages) = validation::validate_new_password(&input.password1, &input.password2)
        {
            for message in messages {
                errors.add("password2", message);
            }
        }

        if let Some(name) = &username {
            if self.user_repo.get_by_username(name).await?.is_some() {
                errors.add("username", USERNAME_TAKEN);
            }
        }
        if let Some(address) = &email {
            if self.user_repo.get_by_email(address).await?.is_some() {
                errors.add("email", EMAIL_TAKEN);
            }
        }

        let (Some(username), Some(email), true) = (username, email, errors.is_empty()) else {
            return Err(errors.into());
        };

        let password_hash = hash_password(&input.password1).context("Failed to hash password")?;
        let user = User::new(username, email, password_hash, UserRole::Member);

        match self.user_repo.create(&user).await {
            Ok(created) => {
                tracing::info!("Registered user {} (id {})", created.username, created.id);
                Ok(created)
            }
            // Lost a race with a concurrent registration
            Err(e) if is_unique_violation(&e) => {
                if self.user_repo.get_by_username(&user.username).await?.is_some() {
                    Err(FormErrors::single("username", USERNAME_TAKEN).into())
                } else {
                    Err(FormErrors::single("email", EMAIL_TAKEN).into())
                }
            }
            Err(e) => Err(e.context("Failed to create user").into()),
        }
    }

    /// Check credentials and open a session.
    ///
    /// Returns the user and the signed session token.
    pub async fn login(&self, input: LoginInput) -> Result<(User, String), UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?;

        let Some(user) = user else {
            tracing::info!("Login failed for unknown user {}", input.username);
            return Err(UserServiceError::AuthenticationError(BAD_CREDENTIALS.to_string()));
        };

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::info!("Login failed for user {}: wrong password", user.username);
            return Err(UserServiceError::AuthenticationError(BAD_CREDENTIALS.to_string()));
        }

        let token = self.start_session(user.id).await?;
        Ok((user, token))
    }

    /// Create a session for `user_id` and return its signed token
    pub async fn start_session(&self, user_id: i64) -> Result<String, UserServiceError> {
        let session = Session::new(user_id);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(self.signer.sign(&session.id))
    }

    /// Logout (invalidate session). Unknown or forged tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        if let Some(session_id) = self.signer.verify(token) {
            self.session_repo
                .delete(&session_id)
                .await
                .context("Failed to delete session")?;
        }
        Ok(())
    }

    /// The user behind a signed session token.
    ///
    /// `None` for bad signatures, unknown or expired sessions.
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session_id) = self.signer.verify(token) else {
            return Ok(None);
        };

        let Some(session) = self
            .session_repo
            .get_active(&session_id)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Make sure the configured staff account exists and has the admin role.
    ///
    /// An existing account with that username is promoted; its password is
    /// left alone.
    pub async fn ensure_staff_account(
        &self,
        admin: &AdminConfig,
    ) -> Result<User, UserServiceError> {
        if let Some(mut user) = self
            .user_repo
            .get_by_username(&admin.username)
            .await
            .context("Failed to look up staff account")?
        {
            if user.is_staff() {
                return Ok(user);
            }
            user.role = UserRole::Admin;
            let promoted = self
                .user_repo
                .update(&user)
                .await
                .context("Failed to promote staff account")?;
            tracing::info!("Promoted {} to staff", promoted.username);
            return Ok(promoted);
        }

        let mut errors = FormErrors::new();
        let username = errors.check("username", validation::validate_username(&admin.username));
        let email = errors.check("email", validation::validate_email(&admin.email));
        if admin.password.is_empty() {
            errors.add("password", validation::REQUIRED);
        }
        let (Some(username), Some(email), true) = (username, email, errors.is_empty()) else {
            return Err(errors.into());
        };

        let password_hash = hash_password(&admin.password).context("Failed to hash password")?;
        let created = self
            .user_repo
            .create(&User::new(username, email, password_hash, UserRole::Admin))
            .await
            .context("Failed to create staff account")?;

        tracing::info!("Created staff account {}", created.username);
        Ok(created)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;

        Ok(count)
    }
}

/// Input for user registration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterInput {
    /// Registration with a confirmed password
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            password1: password.clone(),
            password2: password,
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginInput {
    /// Create a new login input
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}
