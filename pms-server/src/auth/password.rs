//! Password hashing (argon2id, PHC string format)

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::AuthSection;
use crate::models::ValidationError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Hashes and verifies passwords with configured argon2 cost parameters.
#[derive(Clone)]
pub struct Passwords {
    argon2: Argon2<'static>,
    /// Hash checked for unknown accounts so every login pays one argon2 run.
    dummy_hash: String,
}

impl Passwords {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        let mut passwords = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            dummy_hash: String::new(),
        };
        passwords.dummy_hash = passwords.hash("pms-unknown-account")?;
        Ok(passwords)
    }

    pub fn from_config(auth: &AuthSection) -> Result<Self, PasswordError> {
        Self::new(auth.argon2_memory_kib, auth.argon2_iterations)
    }

    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// False for a wrong password and for malformed stored hashes.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Verify against the dummy hash and reject. Used when no account matches.
    pub fn reject_unknown(&self, password: &str) -> bool {
        let _ = self.verify(password, &self.dummy_hash);
        false
    }
}

/// Accept passwords of 8 to 128 characters.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len == 0 {
        return Err(ValidationError::Empty { field: "password" });
    }
    if len < MIN_PASSWORD_LEN {
        return Err(ValidationError::InvalidFormat {
            field: "password",
            reason: "must be at least 8 characters",
        });
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ValidationError::TooLong {
            field: "password",
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Passwords {
        Passwords::new(1024, 1).unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let passwords = cheap();
        let hash = passwords.hash("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(passwords.verify("correct horse", &hash));
        assert!(!passwords.verify("battery staple", &hash));
    }

    #[test]
    fn salts_differ() {
        let passwords = cheap();
        assert_ne!(passwords.hash("same").unwrap(), passwords.hash("same").unwrap());
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!cheap().verify("anything", "not-a-real-hash"));
    }

    #[test]
    fn unknown_accounts_run_a_real_verification() {
        let passwords = cheap();
        assert!(PasswordHash::new(&passwords.dummy_hash).is_ok());
        assert!(passwords.dummy_hash.starts_with("$argon2id$v=19$m=1024,t=1"));
        assert!(!passwords.reject_unknown("pms-unknown-account"));
    }

    #[test]
    fn length_rules() {
        assert!(validate_password("").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn rejects_zero_iterations() {
        assert!(matches!(Passwords::new(1024, 0), Err(PasswordError::Params(_))));
    }
}
