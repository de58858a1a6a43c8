use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::AppError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

/// Caller identity resolved from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,

    /// Session opened by a badge scan rather than a login
    pub kiosk: bool,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let kiosk = match claims.token_type {
            TokenType::Access => false,
            TokenType::Kiosk => true,
            TokenType::Refresh => {
                return Err(AppError::Unauthorized("Access token required".into()));
            }
        };

        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
            kiosk,
        })
    }

    /// Reads `Authorization: Bearer <token>` and validates it
    pub fn from_header(req: &HttpRequest, secret: &str) -> Result<Self, AppError> {
        let token = bearer_token(req)
            .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

        let claims = verify_token(token, secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        Self::from_claims(claims)
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    pub fn require_hr_or_admin(&self) -> Result<(), AppError> {
        if self.is_hr_or_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("HR/Admin only"))
        }
    }

    pub fn is_hr_or_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Hr)
    }

    /// Employee record of the caller, required for self-service endpoints
    pub fn require_employee(&self) -> Result<u64, AppError> {
        self.employee_id
            .ok_or_else(|| AppError::forbidden("No employee profile"))
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn resolve(req: &HttpRequest) -> Result<AuthUser, AppError> {
    // Already resolved by the auth middleware on protected scopes
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal("Config missing".into()))?;

    AuthUser::from_header(req, &config.jwt_secret)
}

/// Full session only; kiosk tokens are refused here.
impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(resolve(req).and_then(|user| {
            if user.kiosk {
                Err(AppError::forbidden("Kiosk session is limited to clock actions"))
            } else {
                Ok(user)
            }
        }))
    }
}

/// Caller of the clock endpoints: a logged-in user or a kiosk session.
#[derive(Debug, Clone)]
pub struct ClockUser(pub AuthUser);

impl FromRequest for ClockUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(resolve(req).map(ClockUser))
    }
}
