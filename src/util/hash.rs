use crate::auth::error::Error;
use crate::core::types::{ClientSecret, HashedClientSecret};

use super::random::FromRandom;

#[derive(Debug)]
pub struct Salt(pub String);

/// Keyed argon2 hashing for client secrets. Verification goes through the
/// argon2 encoded-hash comparison, which is constant-time with respect to
/// the secret material.
#[derive(Debug)]
pub struct HashingService {
    secret_key: String,
}

impl HashingService {
    pub fn with_secret_key(secret_key: String) -> Self {
        Self { secret_key }
    }

    fn get_config(&self) -> argon2::Config<'_> {
        let mut config = argon2::Config::default();
        config.secret = self.secret_key.as_bytes();
        config
    }

    pub fn hash(&self, secret: &ClientSecret) -> Result<HashedClientSecret, Error> {
        let salt = Salt::from_random();
        let hash = argon2::hash_encoded(
            secret.as_ref().as_bytes(),
            salt.0.as_bytes(),
            &self.get_config(),
        )
        .map_err(|e| Error::invalid_argument(format!("argon2 hash failed: {}", e)))?;

        Ok(HashedClientSecret(hash))
    }

    pub fn verify(
        &self,
        secret: &ClientSecret,
        hashed: &HashedClientSecret,
    ) -> Result<bool, Error> {
        argon2::verify_encoded_ext(
            hashed.as_ref(),
            secret.as_ref().as_bytes(),
            self.secret_key.as_bytes(),
            &[],
        )
        .map_err(|e| Error::invalid_argument(format!("argon2 verify failed: {}", e)))
    }
}
