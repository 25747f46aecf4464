// ABOUTME: Round-robin API credential rotation across agent calls.
// ABOUTME: Credentials are validated once at session start and never printed in full.

use std::fmt;
use std::sync::Mutex;

use crate::error::CoreError;

/// Upper bound on configured API keys.
pub const MAX_CREDENTIALS: usize = 8;

/// An API key. `Debug` and `Display` only reveal the last four characters.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for building an Authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn hint(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.hint())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hint())
    }
}

/// Hands out credentials in submission order: the i-th call gets `keys[i mod K]`.
pub struct CredentialRotator {
    credentials: Vec<Credential>,
    next: Mutex<usize>,
}

impl CredentialRotator {
    /// Build a rotator from raw keys. Blank entries are dropped; an empty
    /// or oversized result is rejected.
    pub fn new<I, S>(keys: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let credentials: Vec<Credential> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Credential::new)
            .collect();

        if credentials.is_empty() {
            return Err(CoreError::NoCredentials);
        }
        if credentials.len() > MAX_CREDENTIALS {
            return Err(CoreError::TooManyCredentials {
                count: credentials.len(),
                max: MAX_CREDENTIALS,
            });
        }

        Ok(Self {
            credentials,
            next: Mutex::new(0),
        })
    }

    /// Parse a comma-separated key list, e.g. from an environment variable.
    pub fn from_csv(raw: &str) -> Result<Self, CoreError> {
        Self::new(raw.split(','))
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Take the credential for the next call.
    pub fn next(&self) -> Credential {
        // A poisoned counter is still a valid counter.
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        let index = *next % self.credentials.len();
        *next = next.wrapping_add(1);
        self.credentials[index].clone()
    }
}

impl fmt::Debug for CredentialRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
