use thiserror::Error;

/// Failure of a statement against the store. "Zero rows matched" is never an
/// error: repositories report it as `Ok(None)` / `Ok(false)`.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database operation `{operation}` failed: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Rejected form input. The message names the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The field {0} is required")]
    MissingField(&'static str),
    #[error("The field {0} must be a valid number")]
    InvalidNumber(&'static str),
    #[error("Unknown role {0}")]
    UnknownRole(i32),
    #[error("The submitted form could not be read")]
    UnreadableForm,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("The password must be at least {0} characters long")]
    TooShort(usize),
    #[error("The password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("The password must contain at least one special character {0}")]
    MissingSpecial(&'static str),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Hash(#[from] argon2::password_hash::Error),
    #[error(transparent)]
    Policy(#[from] PasswordPolicyError),
}
