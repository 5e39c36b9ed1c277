//! User Repository (Credential Store)

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{User, UserCreate};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

#[derive(Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find a user by username
    pub async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM user WHERE username = $username LIMIT 1")
            .bind(("username", username.to_string()))
            .await?;
        let user: Option<User> = result.take(0)?;
        Ok(user)
    }

    /// Register a new user
    ///
    /// The password is hashed with argon2 before it is stored; duplicate
    /// usernames are rejected.
    pub async fn create(&self, data: UserCreate) -> RepoResult<User> {
        if self.find_by_username(&data.username).await?.is_some() {
            return Err(RepoError::Duplicate(format!(
                "username {} is already taken",
                data.username
            )));
        }

        let password_hash = User::hash_password(&data.password)
            .map_err(|e| RepoError::Database(format!("Password hashing failed: {e}")))?;

        let mut result = self
            .base
            .db()
            .query(
                "CREATE user SET username = $username, password_hash = $password_hash, role = $role",
            )
            .bind(("username", data.username.clone()))
            .bind(("password_hash", password_hash))
            .bind(("role", data.role))
            .await?
            .check()?;

        let created: Option<User> = result.take(0)?;
        created.ok_or_else(|| RepoError::Database("Failed to create user".to_string()))
    }
}
