use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::CryptoError;

pub const ALGORITHM: &str = "pbkdf2_sha256";
pub const DEFAULT_ITERATIONS: u32 = 260_000;
pub const MIN_PASSWORD_LENGTH: usize = 8;
const SALT_LENGTH: usize = 22;
const DIGEST_LENGTH: usize = 32;
const ABSENT_SALT: &str = "curesioabsentaccount00";

/// PBKDF2-HMAC-SHA256 password hashing in the
/// `pbkdf2_sha256$<iterations>$<salt>$<base64 digest>` format.
///
/// Verification reads the iteration count from the stored hash, so raising
/// `iterations` only affects newly hashed passwords.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn hash(&self, password: &str) -> String {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LENGTH)
            .map(char::from)
            .collect();
        let digest = derive(password, &salt, self.iterations);
        format!("{ALGORITHM}${}${salt}${}", self.iterations, STANDARD.encode(digest))
    }

    /// Constant-time comparison against a stored hash.
    pub fn verify(&self, password: &str, encoded: &str) -> Result<bool, CryptoError> {
        let mut parts = encoded.splitn(4, '$');
        let (Some(algorithm), Some(iterations), Some(salt), Some(expected)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::MalformedHash);
        };
        if algorithm != ALGORITHM {
            return Err(CryptoError::MalformedHash);
        }
        let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
        let expected = STANDARD.decode(expected).map_err(|_| CryptoError::MalformedHash)?;

        let actual = derive(password, salt, iterations);
        Ok(actual.as_slice().ct_eq(&expected).into())
    }

    /// Stand-in for `verify` when no account matched: one derivation at the
    /// configured cost, never a match.
    pub fn verify_absent(&self, password: &str) -> bool {
        let actual = derive(password, ABSENT_SALT, self.iterations);
        let _ = actual.as_slice().ct_eq(&[0u8; DIGEST_LENGTH]);
        false
    }
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; DIGEST_LENGTH] {
    let mut out = [0u8; DIGEST_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
}
