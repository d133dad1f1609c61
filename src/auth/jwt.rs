//! JWT Token Handler
//! Mission: Issue and verify signed, time-bound identity tokens

use crate::auth::models::{Claims, Role, User};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::debug;

/// Default token lifetime (1 day)
pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, expired, or not a token at all
    #[error("invalid or expired token: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),
    /// Key or crypto backend failure while verifying
    #[error("token verification failed: {0}")]
    Internal(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("token lifetime must be positive")]
    InvalidLifetime,
}

impl TokenError {
    fn from_verification(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Rejected(err),
            _ => TokenError::Internal(err),
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, TokenError::Rejected(_) | TokenError::InvalidLifetime)
    }
}

/// JWT Handler for token operations.
///
/// Built once at startup from the configured secret and shared read-only
/// between requests; the secret itself is not retained.
#[derive(Clone)]
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
        }
    }

    pub fn with_ttl_hours(mut self, hours: i64) -> Result<Self, TokenError> {
        if hours <= 0 {
            return Err(TokenError::InvalidLifetime);
        }
        self.ttl = Duration::try_hours(hours).ok_or(TokenError::InvalidLifetime)?;
        Ok(self)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for an identity the caller has already authenticated.
    pub fn issue(&self, subject: &str, email: &str, role: Role) -> Result<String, TokenError> {
        self.issue_at(subject, email, role, Utc::now())
    }

    pub fn generate_token(&self, user: &User) -> Result<String, TokenError> {
        self.issue(&user.id.to_string(), &user.email, user.role)
    }

    pub(crate) fn issue_at(
        &self,
        subject: &str,
        email: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let issued_at = now.timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            role,
            iat: issued_at,
            exp: issued_at + self.ttl.num_seconds(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        debug!(
            "Generating JWT for {} ({}), role {}, expires at {}",
            claims.email, claims.sub, claims.role, claims.exp
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::from_verification)?;

        if decoded.claims.exp <= decoded.claims.iat {
            return Err(TokenError::InvalidLifetime);
        }

        debug!("Validated JWT for {}", decoded.claims.email);

        Ok(decoded.claims)
    }
}
