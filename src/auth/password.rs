use crate::error::{AppError, AppResult};

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Check `password` against a stored hash on the blocking pool, since
/// bcrypt takes a noticeable amount of CPU.
pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password check panicked: {}", e)))??;
    Ok(verified)
}

pub async fn hash_password_blocking(password: String, cost: u32) -> AppResult<String> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing panicked: {}", e)))??;
    Ok(hash)
}

/// Letters, digits and `@.+-_`, up to 150 characters.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username: this field is required.".into());
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username: at most {} characters.",
            MAX_USERNAME_LEN
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err("Username: only letters, digits and @/./+/-/_ are allowed.".into());
    }
    Ok(())
}

pub fn validate_new_password(password: &str, confirmation: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password: must contain at least {} characters.",
            MIN_PASSWORD_LEN
        ));
    }
    if password != confirmation {
        errors.push("Password: the two password fields didn't match.".into());
    }
    errors
}
