// Password hashing with Argon2id
use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};

/// Hash a password using Argon2id with OWASP recommended parameters
/// (19 MiB memory, 2 iterations, parallelism 1, 32-byte output).
pub fn hash_password(password: &str, min_length: usize) -> Result<String> {
    if password.is_empty() {
        return Err(AppError::ValidationError("Please add a password".to_string()));
    }

    if password.chars().count() < min_length {
        return Err(AppError::ValidationError(format!(
            "Password must be at least {} characters",
            min_length
        )));
    }

    let params = Params::new(19456, 2, 1, Some(32))
        .map_err(|e| AppError::Cryptographic(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Cryptographic(format!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a PHC hash string
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Cryptographic(format!("Failed to parse password hash: {}", e)))?;

    // Parameters are read back from the hash itself.
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => {
            tracing::debug!("Password verification failed");
            Ok(false)
        }
        Err(e) => {
            tracing::error!("Password verification error: {}", e);
            Err(AppError::Cryptographic(format!(
                "Password verification error: {}",
                e
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("gatehouse-42", 6).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("gatehouse-42", &hash).unwrap());
        assert!(!verify_password("gatehouse-43", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("gatehouse-42", 6).unwrap();
        let b = hash_password("gatehouse-42", 6).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_min_length_enforced() {
        assert!(matches!(
            hash_password("", 6),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            hash_password("abc12", 6),
            Err(AppError::ValidationError(_))
        ));
        assert!(hash_password("abc123", 6).is_ok());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
