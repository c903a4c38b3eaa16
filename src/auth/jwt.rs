//! JWT token generation and validation
//! Implements access token + refresh token pattern

use super::clock::{Clock, SystemClock};
use crate::{config::SecurityConfig, error::AppError, models::user::UserRole};
use chrono::Duration;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Token verification failure kinds
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Malformed => "TOKEN_MALFORMED",
            TokenError::Expired => "TOKEN_EXPIRED",
            TokenError::Invalid => "TOKEN_INVALID",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
            _ => TokenError::Invalid,
        }
    }
}

/// Token kind, carried in the `token_type` claim
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,

    /// User role
    pub role: UserRole,

    /// Token type (access or refresh)
    pub token_type: TokenKind,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,
}

/// Token pair
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in_ms: u64,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_exp_secs: u64,
    refresh_token_exp_secs: u64,
    clock: Arc<dyn Clock>,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &SecurityConfig) -> Result<Self, AppError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create JWT service with an explicit time source
    pub fn with_clock(config: &SecurityConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let secret = config.jwt_secret.expose_secret();

        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        // Expiry is checked against the injected clock instead of the system time
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_token_exp_secs: config.access_token_exp_secs,
            refresh_token_exp_secs: config.refresh_token_exp_secs,
            clock,
        })
    }

    /// Access token lifetime in milliseconds
    pub fn access_token_exp_ms(&self) -> u64 {
        self.access_token_exp_secs * 1000
    }

    /// Issue a signed token of the given kind
    pub fn issue(&self, subject: &str, role: UserRole, kind: TokenKind) -> Result<String, AppError> {
        let ttl = match kind {
            TokenKind::Access => self.access_token_exp_secs,
            TokenKind::Refresh => self.refresh_token_exp_secs,
        };
        let now = self.clock.now();
        let expiration = now + Duration::seconds(ttl as i64);

        let claims = Claims {
            sub: subject.to_string(),
            role,
            token_type: kind,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode {:?} token: {:?}", kind, e);
            AppError::Internal(format!("Failed to encode token: {}", e))
        })
    }

    /// Generate token pair
    pub fn generate_token_pair(&self, subject: &str, role: UserRole) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue(subject, role, TokenKind::Access)?,
            refresh_token: self.issue(subject, role, TokenKind::Refresh)?,
            expires_in_ms: self.access_token_exp_ms(),
        })
    }

    /// Verify signature and expiry, regardless of kind
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                TokenError::from(e)
            })?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            tracing::debug!(sub = %claims.sub, exp = claims.exp, "Token expired");
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Verify a token and require the given kind
    pub fn parse_kind(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let claims = self.parse(token)?;

        if claims.token_type != kind {
            tracing::debug!(
                "Token type mismatch: expected {:?}, got {:?}",
                kind,
                claims.token_type
            );
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }

    /// Validate access token specifically
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.parse_kind(token, TokenKind::Access)
    }

    /// Validate refresh token specifically
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.parse_kind(token, TokenKind::Refresh)
    }

    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.parse(token).map(|claims| claims.sub)
    }

    pub fn extract_role(&self, token: &str) -> Result<UserRole, TokenError> {
        self.parse(token).map(|claims| claims.role)
    }
}
