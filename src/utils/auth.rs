use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use futures_util::future::{ready, Ready};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::user::Role;
use crate::utils::jwt::{self, TokenKind};

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::InternalServerError("Hashing error".to_string()))
}

pub fn verify_password(hash: &str, plain: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// The caller identified by a valid `Authorization: Bearer <access token>` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|auth| auth.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| AppError::InternalServerError("Configuration missing".to_string()))?;

    let token = bearer_token(req).ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;
    let claims = jwt::validate_token(token, TokenKind::Access, config)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    Ok(AuthUser {
        user_id: claims.user_id()?,
        role: claims.role,
    })
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "wrong horse"));
        assert!(!verify_password("not-a-hash", "correct horse"));
    }

    #[actix_web::test]
    async fn extracts_user_from_bearer_token() {
        let config = Config::for_tests();
        let user_id = Uuid::new_v4();
        let token = jwt::generate_token(user_id, Role::Teacher, TokenKind::Access, &config).unwrap();
        let req = TestRequest::default()
            .app_data(web::Data::new(config))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, Role::Teacher);
    }

    #[actix_web::test]
    async fn rejects_missing_and_refresh_tokens() {
        let config = Config::for_tests();
        let refresh =
            jwt::generate_token(Uuid::new_v4(), Role::Student, TokenKind::Refresh, &config).unwrap();

        let missing = TestRequest::default()
            .app_data(web::Data::new(config.clone()))
            .to_http_request();
        assert!(matches!(AuthUser::extract(&missing).await, Err(AppError::Unauthorized(_))));

        let wrong_kind = TestRequest::default()
            .app_data(web::Data::new(config))
            .insert_header(("Authorization", format!("Bearer {}", refresh)))
            .to_http_request();
        assert!(matches!(AuthUser::extract(&wrong_kind).await, Err(AppError::Unauthorized(_))));
    }
}
