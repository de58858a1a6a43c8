pub mod attendance;
pub mod employee;
pub mod kiosk;
pub mod leave_request;
pub mod organization;

use actix_web::web;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::AppError;

/// 1-based page window parsed from `page` / `per_page` query params
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Pagination {
    pub fn new(page: Option<u64>, per_page: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(10).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }
}

// Extractor failures become 400 with the usual `{"message": ...}` body
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _| AppError::validation(format!("Invalid request body: {err}")).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _| AppError::validation(format!("Invalid query string: {err}")).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _| AppError::validation(format!("Invalid path: {err}")).into())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Instant at which `date` begins in server local time.
pub fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Half-open UTC window covering the local days `start..=end`.
pub fn local_window(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (local_midnight(start), local_midnight(end + Duration::days(1)))
}

#[cfg(test)]
pub(crate) mod testing {
    use actix_web::web;
    use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

    use crate::auth::jwt::{TokenSubject, generate_access_token, generate_kiosk_token};
    use crate::config::Config;
    use crate::model::role::Role;

    pub const SECRET: &str = "test-secret";

    pub fn config() -> Config {
        Config {
            database_url: "mysql://hr:hr@127.0.0.1:3306/hr_test".into(),
            jwt_secret: SECRET.into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            kiosk_token_ttl: 120,
            rate_login_per_min: 1000,
            rate_refresh_per_min: 1000,
            rate_kiosk_per_min: 1000,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            annual_leave_quota: 25,
            run_migrations: false,
            log_dir: "logs".into(),
            log_level: "debug".into(),
        }
    }

    /// Pool that never connects until a query runs; enough for paths
    /// rejected before touching the database.
    pub fn lazy_pool() -> MySqlPool {
        MySqlPoolOptions::new()
            .connect_lazy("mysql://hr:hr@127.0.0.1:3306/hr_test")
            .expect("lazy pool")
    }

    pub fn token(role: Role, employee_id: Option<u64>) -> String {
        let subject = TokenSubject {
            user_id: 1,
            username: "tester".into(),
            role: role.id(),
            employee_id,
        };
        generate_access_token(&subject, SECRET, 300).expect("token")
    }

    pub fn bearer(role: Role, employee_id: Option<u64>) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token(role, employee_id)))
    }

    /// Badge-scan session for an HR employee; the role must not carry over.
    pub fn kiosk_bearer(employee_id: u64) -> (&'static str, String) {
        let subject = TokenSubject {
            user_id: 2,
            username: "hr-kiosk".into(),
            role: Role::Hr.id(),
            employee_id: Some(employee_id),
        };
        let token = generate_kiosk_token(&subject, SECRET, 120).expect("kiosk token");
        ("Authorization", format!("Bearer {token}"))
    }

    /// Registers the shared state and every route, as `main` does.
    pub fn configure(cfg: &mut web::ServiceConfig) {
        let config = config();
        cfg.app_data(web::Data::new(lazy_pool()))
            .app_data(web::Data::new(config.clone()))
            .app_data(super::json_config())
            .app_data(super::query_config())
            .app_data(super::path_config());
        crate::routes::configure(cfg, config);
    }
}
