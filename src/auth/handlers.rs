use crate::{
    auth::{
        auth::{AuthUser, bearer_token},
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::{AppError, constraint_error},
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, RegisterReq, TokenType},
    repo::employee as employee_repo,
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

const SELECT_USER: &str = r#"
    SELECT id, username, password, role_id, employee_id, is_active
    FROM users
"#;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

fn subject_of(user: &User) -> TokenSubject {
    TokenSubject {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role_id,
        employee_id: user.employee_id,
    }
}

async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(claims.user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Issues an access/refresh pair and records the refresh token's jti.
async fn issue_pair(
    pool: &MySqlPool,
    config: &Config,
    user: &User,
) -> Result<LoginResponse, AppError> {
    let subject = subject_of(user);

    let access_token =
        generate_access_token(&subject, &config.jwt_secret, config.access_token_ttl)?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(&subject, &config.jwt_secret, config.refresh_token_ttl)?;

    debug!(user_id = user.id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool, &refresh_claims).await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

/// Create a login account (Admin only)
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully",
            "id": 5
        })),
        (status = 400, description = "Missing username/password or unknown role"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Username taken or employee already linked")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip_all, fields(username = %user.username))]
pub async fn register(
    auth: AuthUser,
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::validation("Username and password must not be empty"));
    }

    let role = Role::from_id(user.role_id)
        .ok_or_else(|| AppError::validation(format!("Unknown role id: {}", user.role_id)))?;

    if let Some(employee_id) = user.employee_id {
        if employee_repo::find(pool.get_ref(), employee_id).await?.is_none() {
            return Err(AppError::not_found("Employee not found"));
        }
    }

    let hashed = hash_password(&user.password)?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)"#,
    )
    .bind(&username)
    .bind(hashed)
    .bind(role.id())
    .bind(user.employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| constraint_error(e, "Username already taken or employee already linked"))?;

    info!(user_id = result.last_insert_id(), role = ?role, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "id": result.last_insert_id()
    })))
}

/// Exchange credentials for an access and a refresh token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::validation("Username or password required"));
    }

    let username = user.username.trim().to_lowercase();
    let db_user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE username = ?"))
        .bind(&username)
        .fetch_optional(pool.get_ref())
        .await
        .inspect_err(|e| error!(error = %e, "Database error while fetching user"))?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: account disabled");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let tokens = issue_pair(pool.get_ref(), &config, &db_user).await?;

    // Not fatal for the login itself
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotate a refresh token (sent as the bearer token)
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair; the presented refresh token is revoked", body = LoginResponse),
        (status = 401, description = "Missing, invalid, expired or revoked refresh token")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req).ok_or_else(|| AppError::Unauthorized("No token".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }

    // Revoke first; a token that was already revoked (or never stored) changes nothing
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await?;

    if revoked.rows_affected() == 0 {
        info!(user_id = claims.user_id, "Refresh rejected: token revoked or unknown");
        return Err(AppError::Unauthorized("Invalid token".into()));
    }

    // Role or employee link may have changed since the token was issued
    let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE id = ?"))
        .bind(claims.user_id)
        .fetch_optional(pool.get_ref())
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Account disabled".into()))?;

    let tokens = issue_pair(pool.get_ref(), &config, &user).await?;

    debug!(user_id = user.id, "Refresh token rotated");

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revoke a refresh token (sent as the bearer token); always 204
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = match bearer_token(&req).map(|t| verify_token(t, &config.jwt_secret)) {
        Some(Ok(c)) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use crate::api::testing;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test};
    use serde_json::json;

    #[actix_web::test]
    async fn login_requires_credentials() {
        let app = test::init_service(App::new().configure(testing::configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/login")
            .peer_addr("127.0.0.1:40005".parse().unwrap())
            .set_json(json!({ "username": " ", "password": "" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn register_is_admin_only() {
        let app = test::init_service(App::new().configure(testing::configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/register")
            .peer_addr("127.0.0.1:40005".parse().unwrap())
            .insert_header(testing::bearer(Role::Hr, Some(2)))
            .set_json(json!({ "username": "new", "password": "pw", "role_id": 3 }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn register_rejects_unknown_role() {
        let app = test::init_service(App::new().configure(testing::configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/register")
            .peer_addr("127.0.0.1:40005".parse().unwrap())
            .insert_header(testing::bearer(Role::Admin, None))
            .set_json(json!({ "username": "new", "password": "pw", "role_id": 9 }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn refresh_with_access_token_is_unauthorized() {
        let app = test::init_service(App::new().configure(testing::configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/refresh")
            .peer_addr("127.0.0.1:40005".parse().unwrap())
            .insert_header(testing::bearer(Role::Employee, Some(7)))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn logout_without_refresh_token_is_no_content() {
        let app = test::init_service(App::new().configure(testing::configure)).await;

        let req = test::TestRequest::post()
            .uri("/auth/logout")
            .peer_addr("127.0.0.1:40005".parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
