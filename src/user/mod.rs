mod service;
mod store;

pub use service::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// User as saved on database.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct User {
    pub username: String,
    pub email: String,
    pub profile_pic: Option<String>,
    pub bio: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
    pub is_superuser: bool,
    #[serde(skip)]
    pub(crate) password: String,
    pub created_at: chrono::NaiveDate,
}

impl User {
    /// Whether the stored credential can ever verify.
    ///
    /// `false` for accounts created without a password.
    pub fn has_usable_password(&self) -> bool {
        !self.password.is_empty()
            && !self
                .password
                .starts_with(crate::crypto::UNUSABLE_PASSWORD_PREFIX)
    }
}

/// Fields accepted when creating a [`User`].
///
/// Unset boolean flags fall back to `false` on regular accounts; see
/// [`UserService::create_superuser`] for the privileged defaults.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, message = "Username is required."))]
    pub username: String,
    pub email: String,
    /// Raw password. `None` yields a disabled credential.
    pub password: Option<String>,
    #[validate(length(
        max = 500,
        message = "Bio must contain at most 500 characters."
    ))]
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}
