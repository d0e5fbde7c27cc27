use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::{accounts::repo_types::Identity, error::AuthError};

const IDENTITY_COLUMNS: &str = "id, email, first_name, last_name, password_hash, external_id, \
     avatar_url, is_active, is_deleted, email_verified, is_admin, created_at, updated_at";

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A uniqueness constraint (email among live rows, or external id) fired.
    #[error("identity conflicts with an existing record")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Conflict => AuthError::ConflictingAccount,
            DirectoryError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl From<sqlx::Error> for DirectoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => DirectoryError::Conflict,
            _ => DirectoryError::Backend(err.into()),
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Point lookups and writes over the identity table. No deletes: removal is a
/// soft delete done through `update`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DirectoryResult<Option<Identity>>;

    /// Exact match, soft-deleted rows included. A live row wins over deleted
    /// rows sharing the same email.
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<Identity>>;

    /// Exact match, soft-deleted rows included.
    async fn find_by_external_id(&self, provider_id: &str) -> DirectoryResult<Option<Identity>>;

    async fn insert(&self, identity: &Identity) -> DirectoryResult<Identity>;

    async fn update(&self, identity: &Identity) -> DirectoryResult<Identity>;
}

#[derive(Clone)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> DirectoryResult<Option<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, Identity>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<Identity>> {
        let sql = format!(
            "SELECT {IDENTITY_COLUMNS} FROM users WHERE email = $1 \
             ORDER BY is_deleted ASC, updated_at DESC LIMIT 1"
        );
        let user = sqlx::query_as::<_, Identity>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_external_id(&self, provider_id: &str) -> DirectoryResult<Option<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE external_id = $1");
        let user = sqlx::query_as::<_, Identity>(&sql)
            .bind(provider_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn insert(&self, identity: &Identity) -> DirectoryResult<Identity> {
        let sql = format!(
            r#"
            INSERT INTO users (id, email, first_name, last_name, password_hash, external_id,
                               avatar_url, is_active, is_deleted, email_verified, is_admin,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {IDENTITY_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, Identity>(&sql)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.first_name)
            .bind(&identity.last_name)
            .bind(&identity.password_hash)
            .bind(&identity.external_id)
            .bind(&identity.avatar_url)
            .bind(identity.is_active)
            .bind(identity.is_deleted)
            .bind(identity.email_verified)
            .bind(identity.is_admin)
            .bind(identity.created_at)
            .bind(identity.updated_at)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn update(&self, identity: &Identity) -> DirectoryResult<Identity> {
        let sql = format!(
            r#"
            UPDATE users
               SET email = $2, first_name = $3, last_name = $4, password_hash = $5,
                   external_id = $6, avatar_url = $7, is_active = $8, is_deleted = $9,
                   email_verified = $10, is_admin = $11, updated_at = now()
             WHERE id = $1
            RETURNING {IDENTITY_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, Identity>(&sql)
            .bind(identity.id)
            .bind(&identity.email)
            .bind(&identity.first_name)
            .bind(&identity.last_name)
            .bind(&identity.password_hash)
            .bind(&identity.external_id)
            .bind(&identity.avatar_url)
            .bind(identity.is_active)
            .bind(identity.is_deleted)
            .bind(identity.email_verified)
            .bind(identity.is_admin)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_conflicting_account() {
        let err: AuthError = DirectoryError::Conflict.into();
        assert!(matches!(err, AuthError::ConflictingAccount));
    }

    #[test]
    fn backend_error_maps_to_internal() {
        let err: AuthError = DirectoryError::from(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
