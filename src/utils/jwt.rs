use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::user::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User id
    pub role: Role,
    pub jti: String,
    pub typ: TokenKind,
    pub exp: usize, // Expiration timestamp
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))
    }

    pub fn token_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.jti).map_err(|_| AppError::BadRequest("Invalid token id".to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

pub fn generate_token(
    user_id: Uuid,
    role: Role,
    kind: TokenKind,
    config: &Config,
) -> Result<String, AppError> {
    let lifetime = match kind {
        TokenKind::Access => Duration::minutes(config.access_token_minutes),
        TokenKind::Refresh => Duration::days(config.refresh_token_days),
    };
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        jti: Uuid::new_v4().to_string(),
        typ: kind,
        exp: (OffsetDateTime::now_utc() + lifetime).unix_timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )
    .map_err(|err| {
        log::error!("Token generation error: {}", err);
        AppError::InternalServerError("Token generation error".to_string())
    })
}

pub fn issue_pair(user_id: Uuid, role: Role, config: &Config) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access: generate_token(user_id, role, TokenKind::Access, config)?,
        refresh: generate_token(user_id, role, TokenKind::Refresh, config)?,
    })
}

/// Decodes and checks signature, expiry and that the token is of `expected` kind.
pub fn validate_token(
    token: &str,
    expected: TokenKind,
    config: &Config,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)?;

    if claims.typ != expected {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidToken.into());
    }
    Ok(claims)
}
