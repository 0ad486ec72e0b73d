use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{RoleName, UserId};

const MIN_SECRET_LEN: usize = 16;
const DEFAULT_TTL_HOURS: i64 = 24;

/// Errors returned by token verification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Signing algorithm or signature does not match.
    #[error("token signature rejected")]
    BadSignature,
    /// Embedded expiry has passed.
    #[error("token has expired")]
    Expired,
}

/// Claims embedded in every issued session token.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    /// Owning user identifier.
    pub user_id: UserId,
    /// Username at issuance time.
    pub username: String,
    /// Role names granted at issuance time.
    pub roles: Vec<RoleName>,
    /// Unique token identifier; keeps the token string unique even for
    /// identical (user, second) issuance pairs.
    pub jti: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Returns the embedded expiry as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Returns the issued-at instant as a timestamp.
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly issued token string together with its claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Signed compact token string.
    pub token: String,
    /// Claims embedded in the token.
    pub claims: Claims,
}

/// HS256 codec for self-contained session tokens.
///
/// The signing secret is injected at construction and validated up front: an
/// empty or short secret fails with [`Error::WeakSecret`] instead of silently
/// signing with a guessable key.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenCodec {
    /// Creates a codec from a symmetric secret.
    pub fn new(secret: impl AsRef<str>) -> Result<Self> {
        let secret = secret.as_ref().trim();
        if secret.is_empty() {
            return Err(Error::WeakSecret("secret must not be empty".into()));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::WeakSecret(format!(
                "secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        // Expiry is judged against the caller's clock in `verify`, so the
        // library's own exp handling is disabled.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        })
    }

    /// Overrides the token lifetime (default 24h).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the configured token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a signed token for the principal at the given instant.
    pub fn issue_at(
        &self,
        user: UserId,
        username: impl Into<String>,
        roles: impl IntoIterator<Item = RoleName>,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        let claims = Claims {
            user_id: user,
            username: username.into(),
            roles: roles.into_iter().collect(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| Error::TokenEncoding(err.to_string()))?;
        Ok(IssuedToken { token, claims })
    }

    /// Verifies signature and embedded expiry; consults no store.
    pub fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::BadSignature)?;
        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(data.claims)
    }
}
