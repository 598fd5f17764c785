//! JWT encoding and verification for access and refresh tokens.
//!
//! Both token types share one HS256 key. They differ in `typ` and lifetime.
//! Expiry is checked with zero leeway so "expired" means expired.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::errors::AppError;
use crate::models::member::{MemberRow, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Member id, as a decimal string.
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub typ: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Seconds until expiry, or `None` once the token is past its `exp`.
    pub fn remaining_secs(&self, now: i64) -> Option<u64> {
        let left = self.exp - now;
        (left > 0).then_some(left as u64)
    }
}

/// A token whose signature checked out, with its subject already parsed.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub member_id: i64,
    pub claims: Claims,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Identity baked into issued tokens.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub member_id: i64,
    pub email: String,
    pub role: Role,
}

impl From<&MemberRow> for TokenSubject {
    fn from(member: &MemberRow) -> Self {
        TokenSubject {
            member_id: member.member_id,
            email: member.email.clone(),
            role: member.role(),
        }
    }
}

#[derive(Clone)]
pub struct JwtCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl JwtCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    /// Builds and signs a fresh token with a random `jti`.
    pub fn issue(&self, subject: &TokenSubject, typ: TokenType) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let ttl = match typ {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        let claims = Claims {
            sub: subject.member_id.to_string(),
            email: subject.email.clone(),
            role: subject.role,
            typ,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl,
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {e}")))
    }

    /// Verifies signature and expiry.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.decode_with(token, true)
    }

    /// Verifies the signature only. Used to revoke tokens that may already be expired.
    pub fn verify_ignoring_expiry(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        self.decode_with(token, false)
    }

    fn decode_with(&self, token: &str, validate_exp: bool) -> Result<VerifiedToken, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        let member_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::Invalid(format!("non-numeric subject '{}'", data.claims.sub)))?;

        Ok(VerifiedToken {
            member_id,
            claims: data.claims,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_codec() -> JwtCodec {
    JwtCodec::new(&crate::config::Config::for_tests().jwt)
}

#[cfg(test)]
pub(crate) fn test_subject(member_id: i64) -> TokenSubject {
    TokenSubject {
        member_id,
        email: format!("member{member_id}@example.com"),
        role: Role::User,
    }
}

/// Signs a token of the given type that expired `ago_secs` seconds ago.
#[cfg(test)]
pub(crate) fn expired_token(codec: &JwtCodec, member_id: i64, typ: TokenType, ago_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: member_id.to_string(),
        email: format!("member{member_id}@example.com"),
        role: Role::User,
        typ,
        jti: Uuid::new_v4().to_string(),
        iat: now - ago_secs - 3600,
        exp: now - ago_secs,
    };
    codec.sign(&claims).unwrap()
}
