use super::auth::{AuthToken, AuthTokenValue, UsernamePasswordCredentials};
use super::permissions::UserRole;
use anyhow::Result;

pub trait UserAuthCredentialsStore: Send + Sync {
    /// Returns the user's password credentials given the user handle.
    /// Returns Ok(None) if the user does not exist or has no password.
    /// Returns Err if there is a database error.
    fn get_password_credentials(
        &self,
        user_handle: &str,
    ) -> Result<Option<UsernamePasswordCredentials>>;

    /// Replaces the user's password credentials.
    fn set_password_credentials(&self, credentials: &UsernamePasswordCredentials) -> Result<()>;

    /// Records a successful login with the password credentials.
    fn touch_password_credentials(&self, user_id: usize) -> Result<()>;
}

pub trait UserAuthTokenStore: Send + Sync {
    /// Returns a user's authentication token given an AuthTokenValue.
    /// Returns Ok(None) if the token does not exist.
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Deletes an auth token given the token value.
    /// Returns Ok(None) if the token does not exist.
    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Updates an auth token with the latest timestamp.
    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()>;

    /// Adds a new auth token.
    fn add_user_auth_token(&self, token: AuthToken) -> Result<()>;

    /// Returns all of a user's authentication tokens.
    fn get_all_user_auth_tokens(&self, user_handle: &str) -> Result<Vec<AuthToken>>;
}

pub trait UserStore: UserAuthTokenStore + UserAuthCredentialsStore + Send + Sync {
    /// Creates a new user and returns the user id.
    fn create_user(&self, user_handle: &str, role: UserRole) -> Result<usize>;

    /// Returns a user's handle given the user id.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>>;

    /// Returns all users' handles.
    fn get_all_user_handles(&self) -> Result<Vec<String>>;

    /// Returns a user's id given the user handle.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>>;

    /// Returns the user's role.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_role(&self, user_id: usize) -> Result<Option<UserRole>>;

    /// Replaces the user's role.
    fn set_user_role(&self, user_id: usize, role: UserRole) -> Result<()>;
}
