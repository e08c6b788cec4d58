//! Password hashing, verification and strength policy, plus secure
//! random token generation.
//!
//! Hashes use Argon2id with OWASP-recommended parameters (memory:
//! 19 MiB, iterations: 2, parallelism: 1). The per-call random salt is
//! returned separately from the PHC hash string and is also mixed into
//! the hashed input, so verification needs both.

use std::fmt;
use std::sync::LazyLock;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use crate::config::DEFAULT_SECURE_TOKEN_BYTES;
use crate::error::AuthError;

/// Case-insensitive substrings that make a password trivially guessable.
const WEAK_PATTERNS: &[&str] = &[
    "password", "123456", "qwerty", "letmein", "welcome", "admin", "iloveyou", "monkey",
    "dragon", "abc123",
];

const SEQUENCE_RUN: usize = 4;
const REPEAT_RUN: usize = 3;

/// Character-class and length requirements for new passwords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

/// A single unmet password requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordViolation {
    TooShort { min_length: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSymbol,
    CommonPattern(String),
    SequentialRun(String),
    RepeatedRun(String),
}

impl fmt::Display for PasswordViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min_length } => {
                write!(f, "must be at least {min_length} characters")
            }
            Self::MissingUppercase => f.write_str("must contain an uppercase letter"),
            Self::MissingLowercase => f.write_str("must contain a lowercase letter"),
            Self::MissingDigit => f.write_str("must contain a digit"),
            Self::MissingSymbol => f.write_str("must contain a symbol"),
            Self::CommonPattern(p) => write!(f, "must not contain common pattern '{p}'"),
            Self::SequentialRun(run) => write!(f, "must not contain sequence '{run}'"),
            Self::RepeatedRun(run) => write!(f, "must not contain repeated characters '{run}'"),
        }
    }
}

fn hasher() -> Result<Argon2<'static>, AuthError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| AuthError::Crypto(format!("argon2 params error: {e}")))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Password bytes followed by the salt, capped at Argon2's maximum
/// password input length.
fn salted_input(password: &str, salt: &str) -> Vec<u8> {
    let mut input = Vec::with_capacity(password.len() + salt.len());
    input.extend_from_slice(password.as_bytes());
    input.extend_from_slice(salt.as_bytes());
    input.truncate(argon2::MAX_PWD_LEN);
    input
}

/// Hash a password with a fresh random salt.
///
/// Returns `(phc_hash, salt)`.
pub fn hash_password(password: &str) -> Result<(String, String), AuthError> {
    if password.is_empty() {
        return Err(AuthError::EmptyPassword);
    }

    let salt = SaltString::generate(&mut OsRng);
    let input = salted_input(password, salt.as_str());
    let hash = hasher()?
        .hash_password(&input, &salt)
        .map_err(|e| AuthError::Crypto(format!("password hash error: {e}")))?;

    Ok((hash.to_string(), salt.as_str().to_string()))
}

/// Verify a password against a stored hash and salt.
///
/// Returns `Ok(false)` on mismatch and `Err(AuthError::Crypto)` if the
/// stored hash is malformed.
pub fn verify_password(password: &str, hash: &str, salt: &str) -> Result<bool, AuthError> {
    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    let input = salted_input(password, salt);
    match Argon2::default().verify_password(&input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Hash and salt of a password nobody knows, built on first use.
static DUMMY_CREDENTIAL: LazyLock<Option<(String, String)>> =
    LazyLock::new(|| hash_password("podid-unknown-account").ok());

/// Spend one full verification against a throwaway hash. Used when there
/// is no stored credential to check, so that the failure costs the same
/// as a wrong password.
pub fn verify_against_dummy(password: &str) {
    if let Some((hash, salt)) = DUMMY_CREDENTIAL.as_ref() {
        let _ = verify_password(password, hash, salt);
    }
}

/// Check a password against `policy` and the built-in pattern rules.
///
/// Every unmet requirement is reported in a single
/// [`AuthError::WeakPassword`].
pub fn validate_strength(password: &str, policy: &PasswordPolicy) -> Result<(), AuthError> {
    let mut violations = Vec::new();

    if password.chars().count() < policy.min_length {
        violations.push(PasswordViolation::TooShort {
            min_length: policy.min_length,
        });
    }
    if policy.require_uppercase && !password.chars().any(char::is_uppercase) {
        violations.push(PasswordViolation::MissingUppercase);
    }
    if policy.require_lowercase && !password.chars().any(char::is_lowercase) {
        violations.push(PasswordViolation::MissingLowercase);
    }
    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordViolation::MissingDigit);
    }
    if policy.require_symbol && !password.chars().any(|c| !c.is_alphanumeric()) {
        violations.push(PasswordViolation::MissingSymbol);
    }

    let lowered = password.to_lowercase();
    if let Some(pattern) = WEAK_PATTERNS.iter().find(|p| lowered.contains(*p)) {
        violations.push(PasswordViolation::CommonPattern((*pattern).to_string()));
    }
    if let Some(run) = sequential_run(&lowered) {
        violations.push(PasswordViolation::SequentialRun(run));
    }
    if let Some(run) = repeated_run(password) {
        violations.push(PasswordViolation::RepeatedRun(run));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(AuthError::WeakPassword(violations))
    }
}

/// First ascending alphabetic or numeric run of [`SEQUENCE_RUN`] chars.
fn sequential_run(lowered: &str) -> Option<String> {
    let chars: Vec<char> = lowered.chars().collect();
    chars.windows(SEQUENCE_RUN).find_map(|w| {
        let same_class = w.iter().all(|c| c.is_ascii_lowercase())
            || w.iter().all(|c| c.is_ascii_digit());
        let ascending = w.windows(2).all(|p| p[1] as u32 == p[0] as u32 + 1);
        (same_class && ascending).then(|| w.iter().collect())
    })
}

/// First run of [`REPEAT_RUN`] identical consecutive chars.
fn repeated_run(password: &str) -> Option<String> {
    let chars: Vec<char> = password.chars().collect();
    chars
        .windows(REPEAT_RUN)
        .find(|w| w.iter().all(|c| *c == w[0]))
        .map(|w| w.iter().collect())
}

/// Generate a cryptographically random token of `bytes` length,
/// base64url-encoded without padding. `0` uses the 32-byte default.
pub fn generate_secure_token(bytes: usize) -> String {
    let len = if bytes == 0 {
        DEFAULT_SECURE_TOKEN_BYTES
    } else {
        bytes
    };
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
