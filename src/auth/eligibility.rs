use crate::{
    accounts::repo_types::Identity,
    error::{AuthError, AuthResult},
};

/// Gate run before minting a session token on every login path. Deletion is
/// checked before activation.
pub fn ensure_can_login(identity: &Identity) -> AuthResult<()> {
    if identity.is_deleted {
        return Err(AuthError::AccountNotFound);
    }
    if !identity.is_active {
        return Err(AuthError::AccountInactive);
    }
    Ok(())
}
