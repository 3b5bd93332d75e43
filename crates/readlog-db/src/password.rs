//! Password hashing, verification, and account-creation policy.
//!
//! Hashes use Argon2id with OWASP-recommended parameters (memory:
//! 19 MiB, iterations: 2, parallelism: 1) and a fresh random salt per
//! hash. An optional pepper (server-side secret) is prepended to the
//! password before hashing and verification.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use readlog_core::models::user::CreateUser;

use crate::error::DbError;

const MAX_USERNAME_LEN: usize = 256;

/// Minimum-strength rules applied to new passwords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: false,
        }
    }
}

impl PasswordPolicy {
    /// Every rule the password breaks, in a stable order.
    pub fn violations(&self, password: &str) -> Vec<String> {
        let mut errors = Vec::new();
        if password.chars().count() < self.min_length {
            errors.push(format!(
                "Passwords must be at least {} characters.",
                self.min_length
            ));
        }
        if self.require_non_alphanumeric && password.chars().all(char::is_alphanumeric) {
            errors.push("Passwords must have at least one non alphanumeric character.".into());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Passwords must have at least one digit ('0'-'9').".into());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            errors.push("Passwords must have at least one lowercase ('a'-'z').".into());
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            errors.push("Passwords must have at least one uppercase ('A'-'Z').".into());
        }
        errors
    }
}

/// Settings owned by the credential store.
#[derive(Debug, Clone, Default)]
pub struct UserStoreConfig {
    pub pepper: Option<String>,
    pub password_policy: PasswordPolicy,
}

/// Format and policy checks for a new account. All problems are
/// collected so the caller can report them together.
pub fn validate_new_user(input: &CreateUser, policy: &PasswordPolicy) -> Vec<String> {
    let mut errors = Vec::new();

    let username = input.username.trim();
    if username.is_empty() {
        errors.push("Username is required.".into());
    } else if username.chars().any(char::is_whitespace) || username.len() > MAX_USERNAME_LEN {
        errors.push(format!("Username '{}' is invalid.", input.username));
    }

    if input.email.trim().is_empty() {
        errors.push("Email is required.".into());
    } else if !is_valid_email(input.email.trim()) {
        errors.push(format!("Email '{}' is invalid.", input.email));
    }

    errors.extend(policy.violations(&input.password));
    errors
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

fn peppered_input<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Hash a password with Argon2id into a PHC string.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hash(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut buf = String::new();
    let input = peppered_input(password, pepper, &mut buf);

    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Hash(format!("hash: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a plaintext password against a PHC-format hash.
///
/// Returns `Ok(false)` on mismatch and an error only when the stored
/// hash is malformed. Parameters are read from the hash itself.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, DbError> {
    let mut buf = String::new();
    let input = peppered_input(password, pepper, &mut buf);

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| DbError::Hash(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Hash(format!("verify: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str, password: &str) -> CreateUser {
        CreateUser {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("Abc12345!", None).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Abc12345!", &hash, None).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("Abc12345!", None).unwrap();
        assert!(!verify_password("Abc12345?", &hash, None).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("Abc12345!", None).unwrap();
        let b = hash_password("Abc12345!", None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn pepper_is_applied() {
        let hash = hash_password("Abc12345!", Some("pepper!")).unwrap();
        assert!(verify_password("Abc12345!", &hash, Some("pepper!")).unwrap());
        assert!(!verify_password("Abc12345!", &hash, None).unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(verify_password("pw", "not-a-hash", None).is_err());
    }

    #[test]
    fn default_policy_collects_every_violation() {
        let errors = PasswordPolicy::default().violations("abc");
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(errors[0].contains("at least 8"));
        assert!(errors.iter().any(|e| e.contains("digit")));
        assert!(errors.iter().any(|e| e.contains("uppercase")));
    }

    #[test]
    fn default_policy_accepts_strong_password() {
        assert!(PasswordPolicy::default().violations("Abc12345").is_empty());
    }

    #[test]
    fn non_alphanumeric_rule_is_opt_in() {
        let policy = PasswordPolicy {
            require_non_alphanumeric: true,
            ..Default::default()
        };
        assert_eq!(policy.violations("Abc12345").len(), 1);
        assert!(policy.violations("Abc12345!").is_empty());
    }

    #[test]
    fn email_format_is_checked() {
        let policy = PasswordPolicy::default();
        assert!(validate_new_user(&new_user("alice", "alice@x.com", "Abc12345!"), &policy).is_empty());

        for bad in ["alice", "alice@", "@x.com", "alice@x", "al ice@x.com", "a@b@c.com", "a@x..com"] {
            let errors = validate_new_user(&new_user("alice", bad, "Abc12345!"), &policy);
            assert_eq!(errors.len(), 1, "{bad}: {errors:?}");
            assert!(errors[0].starts_with("Email"), "{bad}: {errors:?}");
        }
    }

    #[test]
    fn blank_fields_are_required() {
        let errors = validate_new_user(&new_user(" ", "", "Abc12345!"), &PasswordPolicy::default());
        assert_eq!(
            errors,
            vec!["Username is required.".to_string(), "Email is required.".to_string()]
        );
    }
}
