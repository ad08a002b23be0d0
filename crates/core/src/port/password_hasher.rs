// Password Hasher Port
// Crypto lives outside core; core only needs hash and verify.

use crate::error::Result;

pub trait PasswordHasher: Send + Sync {
    /// Produce a self-describing hash (salt included)
    fn hash(&self, password: &str) -> Result<String>;

    /// Check a password against a stored hash
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

pub mod mocks {
    use super::*;

    /// Reversible "hash" for tests only
    pub struct PlainTextHasher;

    impl PasswordHasher for PlainTextHasher {
        fn hash(&self, password: &str) -> Result<String> {
            Ok(format!("plain${}", password))
        }

        fn verify(&self, password: &str, hash: &str) -> Result<bool> {
            Ok(hash.strip_prefix("plain$") == Some(password))
        }
    }
}
