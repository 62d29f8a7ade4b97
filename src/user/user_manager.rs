use super::{
    permissions::{Permission, UserRole},
    AuthToken, AuthTokenValue, UserStore, UsernamePasswordCredentials,
};
use anyhow::{bail, Context, Result};
use std::{sync::Arc, time::SystemTime};
use tracing::info;

pub struct UserManager {
    user_store: Arc<dyn UserStore>,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>) -> Self {
        Self { user_store }
    }

    pub fn add_user<T: AsRef<str>>(&self, user_handle: T, role: UserRole) -> Result<usize> {
        let user_handle = user_handle.as_ref();
        if user_handle.trim().is_empty() {
            bail!("The user handle cannot be empty.")
        }
        if self.user_store.get_user_id(user_handle)?.is_some() {
            bail!("User handle already exists.");
        }

        let user_id = self.user_store.create_user(user_handle, role)?;
        info!("Added user {} ({}) as {}", user_handle, user_id, role.as_str());
        Ok(user_id)
    }

    /// Sets or replaces the password of an existing user.
    pub fn set_password(&self, user_handle: &str, password: &str) -> Result<()> {
        if password.is_empty() {
            bail!("The password cannot be empty.");
        }
        let user_id = self
            .user_store
            .get_user_id(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        let credentials = UsernamePasswordCredentials::create(user_id, password)?;
        self.user_store.set_password_credentials(&credentials)
    }

    /// Checks the password and, on success, issues a fresh session token.
    /// Returns Ok(None) when the user is unknown or the password is wrong.
    pub fn login(&self, user_handle: &str, password: &str) -> Result<Option<AuthToken>> {
        let Some(credentials) = self.user_store.get_password_credentials(user_handle)? else {
            return Ok(None);
        };
        if !credentials.verify(password)? {
            return Ok(None);
        }

        self.user_store
            .touch_password_credentials(credentials.user_id)?;
        let token = AuthToken {
            user_id: credentials.user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_user_auth_token(token.clone())?;
        Ok(Some(token))
    }

    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.get_user_auth_token(value)
    }

    pub fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()> {
        self.user_store
            .update_user_auth_token_last_used_timestamp(value)
    }

    /// Deletes a token, but only when it belongs to `user_id`.
    pub fn delete_auth_token(&self, user_id: usize, value: &AuthTokenValue) -> Result<()> {
        match self.user_store.get_user_auth_token(value)? {
            Some(token) if token.user_id == user_id => {
                self.user_store.delete_user_auth_token(value)?;
                Ok(())
            }
            Some(_) => bail!("Token does not belong to user {}", user_id),
            None => bail!("Token not found"),
        }
    }

    pub fn get_user_tokens(&self, user_handle: &str) -> Result<Vec<AuthToken>> {
        self.user_store.get_all_user_auth_tokens(user_handle)
    }

    pub fn get_all_user_handles(&self) -> Result<Vec<String>> {
        self.user_store.get_all_user_handles()
    }

    pub fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        self.user_store.get_user_id(user_handle)
    }

    pub fn get_user_handle(&self, user_id: usize) -> Result<Option<String>> {
        self.user_store.get_user_handle(user_id)
    }

    pub fn get_user_role(&self, user_id: usize) -> Result<Option<UserRole>> {
        self.user_store.get_user_role(user_id)
    }

    pub fn set_user_role(&self, user_handle: &str, role: UserRole) -> Result<()> {
        let user_id = self
            .user_store
            .get_user_id(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        self.user_store.set_user_role(user_id, role)?;
        info!("User {} is now {}", user_handle, role.as_str());
        Ok(())
    }

    pub fn get_user_permissions(&self, user_id: usize) -> Result<Vec<Permission>> {
        Ok(self
            .user_store
            .get_user_role(user_id)?
            .map(|role| role.permissions().to_vec())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::SqliteUserStore;
    use tempfile::TempDir;

    fn create_manager() -> (UserManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteUserStore::new(temp_dir.path().join("user.db")).unwrap();
        (UserManager::new(Arc::new(store)), temp_dir)
    }

    #[test]
    fn rejects_empty_and_duplicate_handles() {
        let (manager, _dir) = create_manager();
        assert!(manager.add_user("", UserRole::Editor).is_err());
        assert!(manager.add_user("   ", UserRole::Editor).is_err());
        manager.add_user("alice", UserRole::Editor).unwrap();
        assert!(manager.add_user("alice", UserRole::Viewer).is_err());
    }

    #[test]
    fn login_issues_token_only_with_correct_password() {
        let (manager, _dir) = create_manager();
        let user_id = manager.add_user("bob", UserRole::Editor).unwrap();
        manager.set_password("bob", "s3cret").unwrap();

        assert!(manager.login("bob", "wrong").unwrap().is_none());
        assert!(manager.login("nobody", "s3cret").unwrap().is_none());

        let token = manager.login("bob", "s3cret").unwrap().unwrap();
        assert_eq!(token.user_id, user_id);
        let stored = manager.get_auth_token(&token.value).unwrap().unwrap();
        assert_eq!(stored.user_id, user_id);
    }

    #[test]
    fn user_without_password_cannot_login() {
        let (manager, _dir) = create_manager();
        manager.add_user("nopw", UserRole::Viewer).unwrap();
        assert!(manager.login("nopw", "").unwrap().is_none());
        assert!(manager.set_password("nopw", "").is_err());
        assert!(manager.set_password("ghost", "pw").is_err());
    }

    #[test]
    fn token_can_only_be_deleted_by_owner() {
        let (manager, _dir) = create_manager();
        let owner = manager.add_user("owner", UserRole::Editor).unwrap();
        let other = manager.add_user("other", UserRole::Editor).unwrap();
        manager.set_password("owner", "pw").unwrap();
        let token = manager.login("owner", "pw").unwrap().unwrap();

        assert!(manager.delete_auth_token(other, &token.value).is_err());
        assert!(manager.get_auth_token(&token.value).unwrap().is_some());

        manager.delete_auth_token(owner, &token.value).unwrap();
        assert!(manager.get_auth_token(&token.value).unwrap().is_none());
    }

    #[test]
    fn permissions_follow_role() {
        let (manager, _dir) = create_manager();
        let user_id = manager.add_user("carol", UserRole::Viewer).unwrap();
        assert_eq!(
            manager.get_user_permissions(user_id).unwrap(),
            vec![Permission::AccessCatalog]
        );

        manager.set_user_role("carol", UserRole::Editor).unwrap();
        assert!(manager
            .get_user_permissions(user_id)
            .unwrap()
            .contains(&Permission::EditCatalog));
        assert!(manager.get_user_permissions(user_id + 50).unwrap().is_empty());
    }
}
