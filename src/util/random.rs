use crate::core::types::{AccessToken, AuthCode, RefreshToken, SessionToken};

use super::hash::Salt;

pub trait FromRandom {
    fn from_random() -> Self;
}

impl FromRandom for AuthCode {
    fn from_random() -> Self {
        AuthCode(random_string(64))
    }
}

impl FromRandom for AccessToken {
    fn from_random() -> Self {
        AccessToken(random_string(64))
    }
}

impl FromRandom for RefreshToken {
    fn from_random() -> Self {
        RefreshToken(random_string(128))
    }
}

impl FromRandom for SessionToken {
    fn from_random() -> Self {
        SessionToken(random_string(64))
    }
}

impl FromRandom for Salt {
    fn from_random() -> Self {
        Salt(random_string(16))
    }
}

fn random_string(size: usize) -> String {
    use rand::Rng;

    let s: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(size)
        .map(|b| b as char)
        .collect();
    base64::encode_config(s, base64::URL_SAFE_NO_PAD)
}
