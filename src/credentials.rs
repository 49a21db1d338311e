use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::info;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;

use crate::error::StartupError;

/// The single username/password pair accepted by the basic-auth gate.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Uses `explicit` (`user:password`, split on the first colon) when given,
    /// otherwise pairs `default_user` with a random password of
    /// `password_length` characters and logs it once.
    pub fn initialize(
        explicit: Option<&str>,
        default_user: &str,
        password_length: usize,
    ) -> Result<Self, StartupError> {
        if let Some(explicit) = explicit {
            let (username, password) = explicit.split_once(':').ok_or_else(|| {
                StartupError::InvalidConfig("basic auth must be in the form user:password".into())
            })?;
            return Ok(Self::new(username, password));
        }

        let password: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(password_length)
            .map(char::from)
            .collect();
        info!(
            "User generated for basic auth. User: '{}', password: '{}'",
            default_user, password
        );
        Ok(Self::new(default_user, password))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Checks an `Authorization` header value against this credential.
    pub fn matches_header(&self, authorization: &str) -> bool {
        let Some((scheme, encoded)) = authorization.trim().split_once(' ') else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("basic") {
            return false;
        }
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        match decoded.split_once(':') {
            Some((user, pass)) => {
                let user_ok = constant_time_eq(user.as_bytes(), self.username.as_bytes());
                let pass_ok = constant_time_eq(pass.as_bytes(), self.password.as_bytes());
                user_ok & pass_ok
            }
            None => false,
        }
    }

    /// The `Authorization` header value a client would send for this credential.
    pub fn to_header(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.username, self.password))
        )
    }
}

/// Compares two byte strings in time independent of where they first differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
