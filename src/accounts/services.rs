use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    repo::{DirectoryError, DirectoryResult, UserDirectory},
    repo_types::{ExternalProfile, Identity, NewLocalAccount, ProfileUpdate, RestoreFields},
};
use crate::error::{AuthError, AuthResult};

/// Outcome of the signup eligibility check.
#[derive(Debug, Clone, PartialEq)]
pub enum SignupEligibility {
    Create,
    Restore(Identity),
    Block,
}

impl SignupEligibility {
    pub fn action(&self) -> &'static str {
        match self {
            SignupEligibility::Create => "create",
            SignupEligibility::Restore(_) => "restore",
            SignupEligibility::Block => "block",
        }
    }
}

/// Absent -> create, soft-deleted -> restore, live -> block.
pub fn check_signup_eligibility(existing: Option<Identity>) -> SignupEligibility {
    match existing {
        None => SignupEligibility::Create,
        Some(identity) if identity.is_deleted => SignupEligibility::Restore(identity),
        Some(_) => SignupEligibility::Block,
    }
}

/// Resolves a verified external profile to exactly one identity: match by
/// provider id, else link onto the unlinked identity owning the email, else
/// create. An email owned by an identity linked to another provider id is a
/// conflict; a deleted owner is returned untouched for the login gate.
#[instrument(skip(directory, profile), fields(provider_id = %profile.provider_id))]
pub async fn reconcile_external_identity(
    directory: &dyn UserDirectory,
    profile: ExternalProfile,
) -> DirectoryResult<Identity> {
    if let Some(identity) = directory.find_by_external_id(&profile.provider_id).await? {
        debug!(user_id = %identity.id, "external id already linked");
        return Ok(identity);
    }

    if let Some(mut identity) = directory.find_by_email(&profile.email).await? {
        if identity.is_deleted {
            debug!(user_id = %identity.id, "email matches a deleted identity; not linking");
            return Ok(identity);
        }
        if let Some(linked_to) = identity.external_id.as_deref() {
            warn!(
                user_id = %identity.id,
                linked_to,
                "email already linked to another external account"
            );
            return Err(DirectoryError::Conflict);
        }
        identity.external_id = Some(profile.provider_id);
        identity.avatar_url = profile.picture;
        identity.email_verified = profile.email_verified;
        let linked = directory.update(&identity).await?;
        info!(user_id = %linked.id, "linked external id onto existing identity");
        return Ok(linked);
    }

    let created = directory.insert(&Identity::from_external(profile)).await?;
    info!(user_id = %created.id, "created identity from external profile");
    Ok(created)
}

pub async fn create_local_identity(
    directory: &dyn UserDirectory,
    account: NewLocalAccount,
) -> DirectoryResult<Identity> {
    directory.insert(&Identity::new_local(account)).await
}

/// Only valid for a record the eligibility check returned `Restore` for.
#[instrument(skip(directory, identity, fields), fields(user_id = %identity.id))]
pub async fn restore(
    directory: &dyn UserDirectory,
    identity: Identity,
    fields: RestoreFields,
) -> DirectoryResult<Identity> {
    let restored = directory.update(&identity.restored(fields)).await?;
    info!("restored soft-deleted identity");
    Ok(restored)
}

async fn load(directory: &dyn UserDirectory, id: Uuid) -> AuthResult<Identity> {
    directory.find_by_id(id).await?.ok_or(AuthError::NotFound)
}

#[instrument(skip(directory))]
pub async fn soft_delete(directory: &dyn UserDirectory, id: Uuid) -> AuthResult<Identity> {
    let mut identity = load(directory, id).await?;
    if identity.is_deleted {
        return Ok(identity);
    }
    identity.is_deleted = true;
    let deleted = directory.update(&identity).await?;
    info!(user_id = %id, "identity soft-deleted");
    Ok(deleted)
}

#[instrument(skip(directory))]
pub async fn set_active(
    directory: &dyn UserDirectory,
    id: Uuid,
    active: bool,
) -> AuthResult<Identity> {
    let mut identity = load(directory, id).await?;
    identity.is_active = active;
    let updated = directory.update(&identity).await?;
    info!(user_id = %id, active, "identity activation changed");
    Ok(updated)
}

#[instrument(skip(directory, update))]
pub async fn update_profile(
    directory: &dyn UserDirectory,
    id: Uuid,
    update: ProfileUpdate,
) -> AuthResult<Identity> {
    let mut identity = load(directory, id).await?;
    if identity.is_deleted {
        return Err(AuthError::AccountNotFound);
    }
    if let Some(first_name) = update.first_name {
        identity.first_name = non_blank(first_name, "first_name")?;
    }
    if let Some(last_name) = update.last_name {
        identity.last_name = non_blank(last_name, "last_name")?;
    }
    if update.avatar_url.is_some() {
        identity.avatar_url = update.avatar_url;
    }
    Ok(directory.update(&identity).await?)
}

fn non_blank(value: String, field: &str) -> AuthResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{memory::InMemoryUserDirectory, repo_types::sample_identity};

    fn google_profile(provider_id: &str, email: &str) -> ExternalProfile {
        ExternalProfile {
            provider_id: provider_id.into(),
            email: email.into(),
            first_name: "Bea".into(),
            last_name: "Xu".into(),
            picture: Some("https://lh3.googleusercontent.com/b".into()),
            email_verified: true,
        }
    }

    #[test]
    fn eligibility_decisions() {
        assert_eq!(check_signup_eligibility(None), SignupEligibility::Create);

        let mut deleted = sample_identity("a@x.com");
        deleted.is_deleted = true;
        assert_eq!(
            check_signup_eligibility(Some(deleted.clone())),
            SignupEligibility::Restore(deleted)
        );

        let live = sample_identity("a@x.com");
        assert_eq!(check_signup_eligibility(Some(live)), SignupEligibility::Block);
    }

    #[test]
    fn inactive_but_live_identity_blocks_signup() {
        let mut inactive = sample_identity("a@x.com");
        inactive.is_active = false;
        assert_eq!(check_signup_eligibility(Some(inactive)), SignupEligibility::Block);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let dir = InMemoryUserDirectory::new();
        let first = reconcile_external_identity(&dir, google_profile("g123", "b@x.com"))
            .await
            .unwrap();
        let second = reconcile_external_identity(&dir, google_profile("g123", "b@x.com"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(dir.inserts(), 1);
        assert_eq!(dir.updates(), 0);
        assert_eq!(dir.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_links_onto_password_identity() {
        let dir = InMemoryUserDirectory::new();
        let mut existing = sample_identity("b@x.com");
        existing.password_hash = "$argon2id$v=19$stub".into();
        dir.insert(&existing).await.unwrap();

        let linked = reconcile_external_identity(&dir, google_profile("g123", "b@x.com"))
            .await
            .unwrap();
        assert_eq!(linked.id, existing.id);
        assert_eq!(linked.external_id.as_deref(), Some("g123"));
        assert!(linked.email_verified);
        assert_eq!(linked.password_hash, existing.password_hash);
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.inserts(), 1);
        assert_eq!(dir.updates(), 1);
    }

    #[tokio::test]
    async fn reconcile_creates_oauth_only_identity() {
        let dir = InMemoryUserDirectory::new();
        let created = reconcile_external_identity(&dir, google_profile("g9", "new@x.com"))
            .await
            .unwrap();
        assert!(created.is_oauth_only());
        assert!(!created.is_admin);
        assert!(created.is_active && !created.is_deleted);
        assert_eq!(created.avatar_url.as_deref(), Some("https://lh3.googleusercontent.com/b"));
    }

    #[tokio::test]
    async fn reconcile_returns_deleted_match_unchanged() {
        let dir = InMemoryUserDirectory::new();
        let mut deleted = sample_identity("d@x.com");
        deleted.external_id = Some("g77".into());
        deleted.is_deleted = true;
        dir.insert(&deleted).await.unwrap();

        let found = reconcile_external_identity(&dir, google_profile("g77", "d@x.com"))
            .await
            .unwrap();
        assert!(found.is_deleted);
        assert_eq!(dir.updates(), 0);
    }

    #[tokio::test]
    async fn reconcile_refuses_to_relink_other_external_account() {
        let dir = InMemoryUserDirectory::new();
        let mut existing = sample_identity("b@x.com");
        existing.external_id = Some("g1".into());
        dir.insert(&existing).await.unwrap();

        let err = reconcile_external_identity(&dir, google_profile("g2", "b@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Conflict));

        let stored = dir.find_by_id(existing.id).await.unwrap().unwrap();
        assert_eq!(stored.external_id.as_deref(), Some("g1"));
        assert_eq!(dir.updates(), 0);
        assert_eq!(dir.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_does_not_write_to_deleted_email_owner() {
        let dir = InMemoryUserDirectory::new();
        let mut deleted = sample_identity("d@x.com");
        deleted.is_deleted = true;
        dir.insert(&deleted).await.unwrap();

        let found = reconcile_external_identity(&dir, google_profile("g5", "d@x.com"))
            .await
            .unwrap();
        assert_eq!(found.id, deleted.id);
        assert!(found.is_deleted);
        assert!(found.external_id.is_none());
        assert_eq!(dir.updates(), 0);
        assert_eq!(dir.len(), 1);
    }

    #[tokio::test]
    async fn restore_persists_reset_flags() {
        let dir = InMemoryUserDirectory::new();
        let mut identity = sample_identity("a@x.com");
        identity.is_deleted = true;
        identity.is_active = false;
        identity.email_verified = true;
        dir.insert(&identity).await.unwrap();

        let restored = restore(&dir, identity.clone(), RestoreFields::default())
            .await
            .unwrap();
        let stored = dir.find_by_id(identity.id).await.unwrap().unwrap();
        assert_eq!(stored, restored);
        assert!(stored.is_active && !stored.is_deleted && !stored.email_verified);
    }

    #[tokio::test]
    async fn lifecycle_toggles() {
        let dir = InMemoryUserDirectory::new();
        let identity = dir.insert(&sample_identity("a@x.com")).await.unwrap();

        let off = set_active(&dir, identity.id, false).await.unwrap();
        assert!(!off.is_active);
        let deleted = soft_delete(&dir, identity.id).await.unwrap();
        assert!(deleted.is_deleted);
        // second delete is a no-op
        soft_delete(&dir, identity.id).await.unwrap();
        assert_eq!(dir.updates(), 2);

        let missing = set_active(&dir, Uuid::new_v4(), true).await.unwrap_err();
        assert!(matches!(missing, AuthError::NotFound));
    }

    #[tokio::test]
    async fn profile_update_rejects_blank_names() {
        let dir = InMemoryUserDirectory::new();
        let identity = dir.insert(&sample_identity("a@x.com")).await.unwrap();

        let err = update_profile(
            &dir,
            identity.id,
            ProfileUpdate {
                first_name: Some("   ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let updated = update_profile(
            &dir,
            identity.id,
            ProfileUpdate {
                last_name: Some(" Byron ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.last_name, "Byron");
    }
}
