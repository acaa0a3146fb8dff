//! Account creation logic.

use chrono::Utc;
use validator::Validate;

use crate::crypto::{self, PasswordManager};
use crate::error::Result;
use crate::user::{IdentityStore, NewUser, User};

/// User manager.
///
/// Validates incoming fields, hashes credentials and delegates
/// persistence to the [`IdentityStore`].
pub struct UserService<S> {
    store: S,
    pwd: PasswordManager,
}

impl<S: IdentityStore> UserService<S> {
    /// Create a new [`UserService`].
    pub fn new(store: S, pwd: PasswordManager) -> Self {
        Self { store, pwd }
    }

    /// Create a regular account.
    ///
    /// The raw password never reaches the store: it is hashed exactly
    /// once, after the in-memory record is constructed and before the
    /// persist call. A missing password yields a credential that can
    /// never verify.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Validation`] before any persistence call
    /// when `username` is empty, and propagates store failures unchanged.
    ///
    /// [`ServerError::Validation`]: crate::error::ServerError::Validation
    pub async fn create_user(&self, fields: NewUser) -> Result<User> {
        // Required-field check happens before any record construction.
        fields.validate()?;

        let mut user = User {
            username: fields.username,
            email: self.store.normalize_email(&fields.email),
            profile_pic: fields.profile_pic,
            bio: fields.bio,
            is_staff: fields.is_staff.unwrap_or(false),
            is_active: fields.is_active.unwrap_or(false),
            is_superuser: fields.is_superuser.unwrap_or(false),
            password: String::default(),
            created_at: Utc::now().date_naive(),
        };

        user.password = match fields.password.as_deref() {
            Some(raw) => self.pwd.hash_password(raw)?,
            None => crypto::unusable_password(),
        };

        self.store.insert(&user).await?;

        tracing::info!(username = %user.username, "user created");

        Ok(user)
    }

    /// Create a privileged account.
    ///
    /// `is_staff`, `is_active` and `is_superuser` default to `true`
    /// unless the caller already set them. Everything else, the
    /// username-required invariant included, delegates to
    /// [`Self::create_user`].
    pub async fn create_superuser(&self, mut fields: NewUser) -> Result<User> {
        fields.is_staff.get_or_insert(true);
        fields.is_active.get_or_insert(true);
        fields.is_superuser.get_or_insert(true);

        self.create_user(fields).await
    }
}
