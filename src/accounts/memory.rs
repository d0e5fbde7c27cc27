//! In-memory [`UserDirectory`] enforcing the same uniqueness rules as the
//! Postgres schema. Used by tests in place of a database.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    repo::{DirectoryError, DirectoryResult, UserDirectory},
    repo_types::Identity,
};

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<Uuid, Identity>>,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn check_unique(users: &HashMap<Uuid, Identity>, candidate: &Identity) -> DirectoryResult<()> {
        let clash = users.values().any(|other| {
            other.id != candidate.id
                && ((!other.is_deleted && !candidate.is_deleted && other.email == candidate.email)
                    || (other.external_id.is_some() && other.external_id == candidate.external_id))
        });
        if clash {
            return Err(DirectoryError::Conflict);
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> DirectoryResult<Option<Identity>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<Identity>> {
        let users = self.users.lock().unwrap();
        let mut matches: Vec<&Identity> = users.values().filter(|u| u.email == email).collect();
        matches.sort_by_key(|u| (u.is_deleted, std::cmp::Reverse(u.updated_at)));
        Ok(matches.first().map(|u| (*u).clone()))
    }

    async fn find_by_external_id(&self, provider_id: &str) -> DirectoryResult<Option<Identity>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .find(|u| u.external_id.as_deref() == Some(provider_id))
            .cloned())
    }

    async fn insert(&self, identity: &Identity) -> DirectoryResult<Identity> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&identity.id) {
            return Err(DirectoryError::Conflict);
        }
        Self::check_unique(&users, identity)?;
        users.insert(identity.id, identity.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(identity.clone())
    }

    async fn update(&self, identity: &Identity) -> DirectoryResult<Identity> {
        let mut users = self.users.lock().unwrap();
        if !users.contains_key(&identity.id) {
            return Err(DirectoryError::Backend(anyhow::anyhow!(
                "no user with id {}",
                identity.id
            )));
        }
        Self::check_unique(&users, identity)?;
        let mut stored = identity.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        users.insert(stored.id, stored.clone());
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::repo_types::sample_identity;

    #[tokio::test]
    async fn rejects_second_live_identity_with_same_email() {
        let dir = InMemoryUserDirectory::new();
        dir.insert(&sample_identity("a@x.com")).await.unwrap();
        let err = dir.insert(&sample_identity("a@x.com")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict));
    }

    #[tokio::test]
    async fn deleted_identity_does_not_block_email() {
        let dir = InMemoryUserDirectory::new();
        let mut first = sample_identity("a@x.com");
        first.is_deleted = true;
        dir.insert(&first).await.unwrap();
        let second = dir.insert(&sample_identity("a@x.com")).await.unwrap();

        let found = dir.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn external_id_is_unique() {
        let dir = InMemoryUserDirectory::new();
        let mut a = sample_identity("a@x.com");
        a.external_id = Some("g1".into());
        let mut b = sample_identity("b@x.com");
        b.external_id = Some("g1".into());
        dir.insert(&a).await.unwrap();
        assert!(matches!(
            dir.insert(&b).await.unwrap_err(),
            DirectoryError::Conflict
        ));
    }
}
