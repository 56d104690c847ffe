use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User, UserPatch};
use crate::repository::UserStore;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        UserService { store }
    }

    pub async fn create_user(&self, user: NewUser) -> AppResult<User> {
        if user.phone.trim().is_empty() {
            return Err(AppError::BadRequest("phone cannot be empty".to_string()));
        }
        if user.name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }

        self.store.create_user(user).await
    }

    pub async fn get_user_by_id(&self, id: i64) -> AppResult<User> {
        self.store.get_user(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn get_user_by_phone(&self, phone: &str) -> AppResult<User> {
        self.store
            .get_user_by_phone(phone)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn update_user(&self, id: i64, patch: UserPatch) -> AppResult<User> {
        self.store
            .update_user(id, patch)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Stamps the user's last_online to now. Called when a session opens
    /// and closes.
    pub async fn touch_last_online(&self, id: i64) -> AppResult<()> {
        let patch = UserPatch {
            last_online: Some(Utc::now()),
            ..UserPatch::default()
        };
        self.store.update_user(id, patch).await?;
        Ok(())
    }

    /// Adds the user behind `phone` to the caller's contacts. Blocked
    /// callers cannot add the user who blocked them.
    pub async fn add_contact(&self, user_id: i64, phone: &str) -> AppResult<User> {
        let contact = self.get_user_by_phone(phone).await?;
        if contact.id == user_id {
            return Err(AppError::BadRequest(
                "cannot add yourself as a contact".to_string(),
            ));
        }
        if self.store.is_blocked(user_id, contact.id).await? {
            return Err(AppError::Forbidden);
        }

        self.store.add_contact(user_id, contact.id).await?;
        Ok(contact)
    }

    pub async fn block_user(&self, user_id: i64, phone: &str) -> AppResult<User> {
        let target = self.get_user_by_phone(phone).await?;
        if target.id == user_id {
            return Err(AppError::BadRequest("cannot block yourself".to_string()));
        }

        self.store.add_block(user_id, target.id).await?;
        Ok(target)
    }

    /// True when `target_id` has blocked `user_id`.
    pub async fn is_user_blocked(&self, user_id: i64, target_id: i64) -> AppResult<bool> {
        self.store.is_blocked(user_id, target_id).await
    }
}
