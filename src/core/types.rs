use std::{
    str::FromStr,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
}

/// A set of space-delimited scope entries. Entry order from the wire is
/// preserved so a granted scope string round-trips unchanged.
#[derive(Debug, Clone, Eq)]
pub struct Scope(Vec<String>);

impl Scope {
    pub fn from_parts(parts: Vec<String>) -> Self {
        Self(parts)
    }

    pub fn from_delimited_parts(parts: &str) -> Self {
        let parts = parts.split_whitespace().map(ToString::to_string).collect();
        Self(parts)
    }

    pub fn as_joined(&self) -> String {
        self.0.join(" ")
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.iter().any(|s| s == entry)
    }

    pub fn as_parts(&self) -> &[String] {
        &self.0
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        let mut lhs = self.0.clone();
        let mut rhs = other.0.clone();
        lhs.sort();
        rhs.sort();
        lhs == rhs
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parts = String::deserialize(deserializer)?;
        Ok(Self::from_delimited_parts(&parts))
    }
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let joined = self.as_joined();
        serializer.serialize_str(&joined)
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl FromStr for ClientId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct RedirectUri(pub String);

impl Default for RedirectUri {
    // A client with no registered URI carries an empty string, never null.
    fn default() -> Self {
        Self(String::new())
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct ClientSecret(pub String);

impl AsRef<str> for ClientSecret {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct HashedClientSecret(pub String);

impl From<String> for HashedClientSecret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for HashedClientSecret {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct AuthCode(pub String);

impl AsRef<str> for AuthCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

impl AsRef<str> for AccessToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

impl AsRef<str> for RefreshToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// An opaque proof of an established user session, supplied by the
/// surrounding authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(pub String);

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct UnixTime(pub i64);

impl UnixTime {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs();
        Self(secs as i64)
    }

    pub fn epoch() -> Self {
        Self(0)
    }

    pub fn plus_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs as i64))
    }

    pub fn is_past(self) -> bool {
        self <= Self::now()
    }

    /// Whole seconds remaining until `self`, clamped at zero.
    pub fn secs_from_now(self) -> u64 {
        let now = Self::now();
        if self.0 > now.0 {
            (self.0 - now.0) as u64
        } else {
            0
        }
    }
}

impl Default for UnixTime {
    fn default() -> Self {
        Self::epoch()
    }
}

pub trait Expire {
    const EXPIRES_IN_SECS: u64;

    fn expiry() -> UnixTime {
        UnixTime::now().plus_secs(Self::EXPIRES_IN_SECS)
    }
}
