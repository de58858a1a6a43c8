use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::auth::jwt::{TokenSubject, generate_kiosk_token};
use crate::config::Config;
use crate::error::AppError;
use crate::model::attendance::{ClockAction, RecordType, available_actions};
use crate::model::employee::EmployeeCard;
use crate::model::user::User;
use crate::repo::attendance as attendance_repo;
use crate::repo::employee as employee_repo;
use crate::utils::directory_cache;

#[derive(Deserialize, ToSchema)]
pub struct CardScan {
    #[schema(example = "04:A2:3B:1C", nullable = true)]
    pub nfc_id: Option<String>,
    #[schema(example = "EMP-001-7f3a", nullable = true)]
    pub qr_code: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CardSession {
    pub employee: EmployeeCard,
    #[schema(nullable = true)]
    pub last_record_type: Option<RecordType>,
    pub available_actions: Vec<ClockAction>,
    /// Short-lived bearer token accepted only by the clock endpoints
    pub access_token: String,
    /// Token lifetime in seconds
    #[schema(example = 120)]
    pub expires_in: usize,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Identify an employee from a badge scan
#[utoipa::path(
    post,
    path = "/kiosk/authenticate-card",
    request_body = CardScan,
    responses(
        (status = 200, description = "Card recognised", body = CardSession),
        (status = 400, description = "Neither nfc_id nor qr_code given"),
        (status = 404, description = "Unknown card or no active account"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Kiosk"
)]
pub async fn authenticate_card(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CardScan>,
) -> Result<HttpResponse, AppError> {
    let nfc_id = non_blank(payload.nfc_id.as_deref());
    let qr_code = non_blank(payload.qr_code.as_deref());

    if nfc_id.is_none() && qr_code.is_none() {
        return Err(AppError::validation("nfc_id or qr_code is required"));
    }

    let employee = employee_repo::find_by_badge(pool.get_ref(), nfc_id, qr_code)
        .await?
        .ok_or_else(|| {
            tracing::info!(nfc = nfc_id.is_some(), qr = qr_code.is_some(), "Unknown card scanned");
            AppError::not_found("Card not recognised")
        })?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE employee_id = ? AND is_active = TRUE
        "#,
    )
    .bind(employee.id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::not_found("No active account for this employee"))?;

    let card = employee.card();
    directory_cache::remember(card.clone()).await;

    let last = attendance_repo::last_record_type(pool.get_ref(), employee.id).await?;

    let subject = TokenSubject {
        user_id: user.id,
        username: user.username,
        role: user.role_id,
        employee_id: Some(employee.id),
    };
    let access_token = generate_kiosk_token(&subject, &config.jwt_secret, config.kiosk_token_ttl)?;

    tracing::info!(employee_id = employee.id, "Card authenticated");

    Ok(HttpResponse::Ok().json(CardSession {
        employee: card,
        last_record_type: last,
        available_actions: available_actions(last),
        access_token,
        expires_in: config.kiosk_token_ttl,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;
    use actix_web::{App, http::StatusCode, test as actix_test};
    use serde_json::json;

    #[test]
    fn blank_ids_are_ignored() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" 04:A2 ")), Some("04:A2"));
        assert_eq!(non_blank(None), None);
    }

    #[actix_web::test]
    async fn scan_without_identifiers_is_rejected() {
        let app = actix_test::init_service(App::new().configure(testing::configure)).await;

        let req = actix_test::TestRequest::post()
            .uri("/kiosk/authenticate-card")
            .peer_addr("127.0.0.1:40004".parse().unwrap())
            .set_json(json!({ "nfc_id": "", "qr_code": null }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["message"], "nfc_id or qr_code is required");
    }

    #[actix_web::test]
    async fn kiosk_session_cannot_manage_leave_or_accounts() {
        let app = actix_test::init_service(App::new().configure(testing::configure)).await;

        let approve = actix_test::TestRequest::put()
            .uri("/api/leave/1/approve")
            .peer_addr("127.0.0.1:40004".parse().unwrap())
            .insert_header(testing::kiosk_bearer(7))
            .to_request();
        let resp = actix_test::call_service(&app, approve).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let history = actix_test::TestRequest::get()
            .uri("/api/attendance/history")
            .peer_addr("127.0.0.1:40004".parse().unwrap())
            .insert_header(testing::kiosk_bearer(7))
            .to_request();
        let resp = actix_test::call_service(&app, history).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let register = actix_test::TestRequest::post()
            .uri("/auth/register")
            .peer_addr("127.0.0.1:40004".parse().unwrap())
            .insert_header(testing::kiosk_bearer(7))
            .set_json(json!({ "username": "x", "password": "long-enough-pass", "role_id": 1 }))
            .to_request();
        let resp = actix_test::call_service(&app, register).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn kiosk_session_reaches_clock_endpoint() {
        let app = actix_test::init_service(App::new().configure(testing::configure)).await;

        // Past authentication, the payload itself is what fails
        let req = actix_test::TestRequest::post()
            .uri("/api/attendance")
            .peer_addr("127.0.0.1:40004".parse().unwrap())
            .insert_header(testing::kiosk_bearer(7))
            .set_json(json!({ "record_type": "LUNCH" }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
