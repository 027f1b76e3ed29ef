use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::{
    error::{AuthError, PasswordPolicyError},
    models::{Identity, NewUser, Role},
    repository::Repository,
};

/// Minimum password length accepted by [`validate_password_policy`].
pub const MIN_PASSWORD_LEN: usize = 8;

/// Characters of which a password must contain at least one.
pub const SPECIAL_CHARACTERS: &str = "()$%\"!/&@#";

/// validate_password_policy
///
/// Stateless rule check applied to every password before it is hashed and stored.
pub fn validate_password_policy(candidate: &str) -> Result<(), PasswordPolicyError> {
    if candidate.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordPolicyError::TooShort(MIN_PASSWORD_LEN));
    }
    if !candidate.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(PasswordPolicyError::MissingUppercase);
    }
    if !candidate.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(PasswordPolicyError::MissingSpecial(SPECIAL_CHARACTERS));
    }
    Ok(())
}

/// Hashes `secret` with Argon2id and a fresh random salt, returning the PHC string.
pub fn hash_password(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(secret.as_bytes(), &salt)?
        .to_string())
}

/// Verifies `secret` against a stored PHC string. A malformed stored hash is a
/// mismatch, never a match.
pub fn verify_password(secret: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "stored password hash is not a valid PHC string");
            false
        }
    }
}

/// login
///
/// Resolves `identifier` as a username or an email and checks `secret`.
///
/// Returns `Ok(Some(identity))` only when exactly one user matches and the password
/// verifies; `Ok(None)` for every credential mismatch; `Err` when the lookup failed.
pub async fn login(
    repo: &dyn Repository,
    identifier: &str,
    secret: &str,
) -> Result<Option<Identity>, AuthError> {
    let mut candidates = repo.find_login_candidates(identifier).await?;

    if candidates.len() != 1 {
        tracing::warn!(
            identifier,
            matches = candidates.len(),
            "login rejected: identifier did not resolve to exactly one user"
        );
        return Ok(None);
    }
    let user = candidates.remove(0);

    if !verify_password(secret, &user.password_hash) {
        tracing::warn!(user_id = user.id, "login rejected: wrong password");
        return Ok(None);
    }

    tracing::info!(user_id = user.id, role = %user.role_name, "login succeeded");
    Ok(Some(Identity {
        user_id: user.id,
        username: user.username,
        role_id: user.role_id,
        role_name: user.role_name,
    }))
}

/// register_user
///
/// Enforces the password policy, hashes the password and stores the user.
pub async fn register_user(
    repo: &dyn Repository,
    code: String,
    username: String,
    email: String,
    password: &str,
    role: Role,
) -> Result<i32, AuthError> {
    validate_password_policy(password)?;
    let password_hash = hash_password(password)?;

    let id = repo
        .create_user(NewUser {
            code,
            username,
            email,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = id, ?role, "user created");
    Ok(id)
}
