//! Account operations.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use drive_auth::PasswordHasher;
use drive_auth::jwt::{AuthToken, JwtEncoder};
use drive_core::error::AppError;
use drive_core::result::AppResult;
use drive_core::types::UserId;
use drive_database::DriveStore;
use drive_entity::change::{ChangeSet, Mutation};
use drive_entity::entry::Entry;
use drive_entity::user::User;

/// Signup request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    /// Username.
    #[validate(length(min = 4, max = 32, message = "Username must be 4 to 32 characters"))]
    pub username: String,
    /// Password.
    #[validate(length(min = 4, max = 576, message = "Password must be 4 to 576 characters"))]
    pub password: String,
}

/// Login request body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username.
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    /// Password.
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// A new user together with the change set creating it and its two
/// root directories.
pub fn provision(username: &str, password_hash: String) -> (User, ChangeSet) {
    let id = UserId::new();
    let drive = Entry::directory(id, None, None, "drive");
    let bin = Entry::directory(id, None, None, "bin");
    let user = User {
        id,
        username: username.to_string(),
        password_hash,
        used_space: 0,
        drive_id: drive.id,
        bin_id: bin.id,
        created_at: Utc::now(),
    };

    let mut changes = ChangeSet::new();
    changes
        .push(Mutation::InsertUser(user.clone()))
        .push(Mutation::InsertEntry(drive))
        .push(Mutation::InsertEntry(bin));
    (user, changes)
}

/// Handles account operations.
#[derive(Debug, Clone)]
pub struct UserService {
    /// Drive store.
    store: Arc<dyn DriveStore>,
    /// Password hasher.
    hasher: Arc<PasswordHasher>,
    /// Token issuer.
    encoder: Arc<JwtEncoder>,
}

impl UserService {
    /// Creates a new user service.
    pub fn new(
        store: Arc<dyn DriveStore>,
        hasher: Arc<PasswordHasher>,
        encoder: Arc<JwtEncoder>,
    ) -> Self {
        Self {
            store,
            hasher,
            encoder,
        }
    }

    /// Creates an account with its drive and bin, then logs it in.
    pub async fn signup(&self, req: SignupRequest) -> AppResult<AuthToken> {
        req.validate()
            .map_err(|e| AppError::validation(format!("Invalid signup: {e}")))?;

        if self.store.find_user_by_username(&req.username).await?.is_some() {
            return Err(AppError::collision(format!(
                "Username '{}' is already taken",
                req.username
            )));
        }

        let hash = self.hasher.hash(&req.password)?;
        let (user, changes) = provision(&req.username, hash);
        self.store.apply(changes).await?;

        info!(user_id = %user.id, username = %user.username, "User signed up");
        self.encoder.issue(&user)
    }

    /// Checks credentials and issues a token.
    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthToken> {
        req.validate()
            .map_err(|e| AppError::validation(format!("Invalid login: {e}")))?;

        let Some(user) = self.store.find_user_by_username(&req.username).await? else {
            self.hasher.verify_absent(&req.password);
            warn!(username = %req.username, "Login for unknown user");
            return Err(AppError::authentication("Invalid username or password"));
        };

        if !self.hasher.verify(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "Login with wrong password");
            return Err(AppError::authentication("Invalid username or password"));
        }

        info!(user_id = %user.id, "User logged in");
        self.encoder.issue(&user)
    }

    /// Id of the user with the given username.
    pub async fn username_to_id(&self, username: &str) -> AppResult<UserId> {
        self.store
            .find_user_by_username(username)
            .await?
            .map(|user| user.id)
            .ok_or_else(|| AppError::not_found(format!("User '{username}' not found")))
    }

    /// Gets a user by id.
    pub async fn get_user(&self, user_id: UserId) -> AppResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))
    }
}
