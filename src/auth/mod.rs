/*!
 * # Authentication and Authorization
 *
 * Bearer JWTs are issued by the campus identity service (or by
 * [`AuthService::generate_token`] for seeded accounts and tests). The
 * middleware validates the token, resolves the role's permissions from
 * [`rbac`] and stores an [`AuthUser`] in the request extensions.
 */

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user::{self, Role};

pub mod permissions;
pub mod rbac;

pub use permissions::consts as perm;

/// Payload of an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // Subject (user ID)
    pub name: Option<String>, // Display name
    pub role: String,         // Role name, see entities::user::Role
    pub jti: String,          // JWT ID
    pub iat: i64,             // Issued at time
    pub exp: i64,             // Expiration time
    pub nbf: i64,             // Not valid before time
    pub iss: String,          // Issuer
    pub aud: String,          // Audience
}

/// The caller, as established by [`auth_middleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub name: Option<String>,
    pub role: Role,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Staff may look at any customer's orders.
    pub fn is_staff(&self) -> bool {
        self.role != Role::Customer
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Issued access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    accounts: Option<Arc<DatabaseConnection>>,
}

impl AuthService {
    /// Token-only service: the role in the token is trusted as issued.
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            accounts: None,
        }
    }

    /// Checks every token against the `users` table, so a deactivated
    /// account or a role change takes effect on the next request.
    pub fn with_accounts(mut self, db: Arc<DatabaseConnection>) -> Self {
        self.accounts = Some(db);
        self
    }

    /// Issues an HS256 access token carrying the user's id and role.
    pub fn generate_token(&self, user: &user::Model) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            name: Some(user.display_name().to_string()),
            role: user.role.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    /// Checks signature, expiry, audience and issuer.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        Ok(claims)
    }

    /// Turns validated claims into the request's [`AuthUser`].
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id = claims
            .sub
            .parse::<i32>()
            .map_err(|_| AuthError::InvalidToken)?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthUser {
            user_id,
            name: claims.name,
            role,
            permissions: rbac::permissions_for(role),
            token_id: claims.jti,
        })
    }

    /// [`Self::authenticate`], then the account lookup when one is configured.
    pub async fn authenticate_request(&self, token: &str) -> Result<AuthUser, AuthError> {
        let mut caller = self.authenticate(token)?;
        let Some(db) = self.accounts.as_deref() else {
            return Ok(caller);
        };

        let account = user::Entity::find_by_id(caller.user_id)
            .one(db)
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        match account {
            Some(account) if account.is_active => {
                if account.role != caller.role {
                    debug!(user_id = caller.user_id, from = %caller.role, to = %account.role, "role changed since token was issued");
                    caller.role = account.role;
                    caller.permissions = rbac::permissions_for(account.role);
                }
                Ok(caller)
            }
            _ => Err(AuthError::AccountDisabled),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Account is disabled or no longer exists")]
    AccountDisabled,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Status, machine-readable code and client message.
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            Self::MissingAuth => (StatusCode::UNAUTHORIZED, "AUTH_MISSING", "Authentication required"),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token",
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Authentication token has expired",
            ),
            Self::AccountDisabled => (
                StatusCode::UNAUTHORIZED,
                "AUTH_ACCOUNT_DISABLED",
                "Account is disabled",
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions",
            ),
            Self::TokenCreation(_) | Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal authentication error",
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            warn!(error = %self, "authentication failed internally");
        }

        let body = serde_json::json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "code": code,
            "message": message,
            "request_id": crate::tracing::current_request_id().map(|rid| rid.0),
            "timestamp": Utc::now().to_rfc3339(),
        });
        (status, Json(body)).into_response()
    }
}

/// Rejects requests whose user lacks `required_permission`.
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.has_permission(&required_permission) {
        debug!(
            user_id = user.user_id,
            role = %user.role,
            permission = %required_permission,
            "permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Resolves the `Authorization: Bearer` header into an [`AuthUser`] extension.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    let token = match bearer_token(request.headers()) {
        Ok(token) => token.to_owned(),
        Err(e) => return e.into_response(),
    };
    let authenticated = auth_service.authenticate_request(&token).await;
    match authenticated {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingAuth)
}

/// Route-group guards. `with_permission` implies `with_auth`.
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}
