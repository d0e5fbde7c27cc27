use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Canonical account record in the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // empty for OAuth-only accounts
    pub external_id: Option<String>, // Google `sub`
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub email_verified: bool,
    pub is_admin: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Profile extracted from a verified external ID token, with the required
/// fields already checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub provider_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub picture: Option<String>,
    pub email_verified: bool,
}

/// Fields for a password signup, password already hashed.
#[derive(Debug, Clone)]
pub struct NewLocalAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// Attributes laid over a soft-deleted record when it is restored.
#[derive(Debug, Clone, Default)]
pub struct RestoreFields {
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Self-service profile edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Public part of the identity returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentitySummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub is_admin: bool,
    pub is_active: bool,
}

impl Identity {
    pub fn new_local(account: NewLocalAccount) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            password_hash: account.password_hash,
            external_id: None,
            avatar_url: None,
            is_active: true,
            is_deleted: false,
            email_verified: false,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_external(profile: ExternalProfile) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            email: profile.email,
            first_name: profile.first_name,
            last_name: profile.last_name,
            password_hash: String::new(),
            external_id: Some(profile.provider_id),
            avatar_url: profile.picture,
            is_active: true,
            is_deleted: false,
            email_verified: profile.email_verified,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// No local password; only the external provider path can log in.
    pub fn is_oauth_only(&self) -> bool {
        self.password_hash.is_empty()
    }

    /// Clears the soft-delete, forces the account active and unverified,
    /// then overlays `fields`.
    pub fn restored(mut self, fields: RestoreFields) -> Self {
        self.is_deleted = false;
        self.is_active = true;
        self.email_verified = false;
        if let Some(hash) = fields.password_hash {
            self.password_hash = hash;
        }
        if let Some(first_name) = fields.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = fields.last_name {
            self.last_name = last_name;
        }
        if fields.avatar_url.is_some() {
            self.avatar_url = fields.avatar_url;
        }
        self.updated_at = OffsetDateTime::now_utc();
        self
    }

    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar_url: self.avatar_url.clone(),
            email_verified: self.email_verified,
            is_admin: self.is_admin,
            is_active: self.is_active,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_identity(email: &str) -> Identity {
    Identity::new_local(NewLocalAccount {
        email: email.to_string(),
        password_hash: String::new(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_resets_lifecycle_flags_from_any_state() {
        for (active, deleted, verified) in [
            (true, true, true),
            (false, true, true),
            (false, true, false),
            (true, false, true),
            (false, false, false),
        ] {
            let mut identity = sample_identity("a@x.com");
            identity.is_active = active;
            identity.is_deleted = deleted;
            identity.email_verified = verified;

            let restored = identity.restored(RestoreFields::default());
            assert!(!restored.is_deleted);
            assert!(restored.is_active);
            assert!(!restored.email_verified);
        }
    }

    #[test]
    fn restore_overlays_new_fields_and_keeps_id() {
        let mut identity = sample_identity("a@x.com");
        identity.is_deleted = true;
        let id = identity.id;

        let restored = identity.restored(RestoreFields {
            password_hash: Some("new-hash".into()),
            first_name: Some("Grace".into()),
            last_name: None,
            avatar_url: None,
        });
        assert_eq!(restored.id, id);
        assert_eq!(restored.password_hash, "new-hash");
        assert_eq!(restored.first_name, "Grace");
        assert_eq!(restored.last_name, "Lovelace");
    }

    #[test]
    fn external_identity_has_no_password() {
        let identity = Identity::from_external(ExternalProfile {
            provider_id: "g123".into(),
            email: "b@x.com".into(),
            first_name: "B".into(),
            last_name: "X".into(),
            picture: Some("https://img/b.png".into()),
            email_verified: true,
        });
        assert!(identity.is_oauth_only());
        assert!(!identity.is_admin);
        assert!(identity.is_active);
        assert!(!identity.is_deleted);
        assert_eq!(identity.external_id.as_deref(), Some("g123"));
    }

    #[test]
    fn summary_hides_password_hash() {
        let mut identity = sample_identity("c@x.com");
        identity.password_hash = "$argon2id$secret".into();
        let json = serde_json::to_string(&identity).unwrap();
        assert!(!json.contains("argon2id"));
        let summary = serde_json::to_string(&identity.summary()).unwrap();
        assert!(summary.contains("c@x.com"));
    }
}
