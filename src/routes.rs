use crate::error::AppError;
use crate::event_queue::EventQueue;
use crate::store::UserStore;
use crate::tracker::LoginTracker;
use crate::user::validate_username;
use actix_web::{web, HttpResponse, Responder};
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub tracker: LoginTracker,
    pub events: EventQueue,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticationNotice {
    pub principal: String,
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Accepts a successful-authentication notification for asynchronous
/// tracking.
pub async fn publish_authentication(
    state: web::Data<AppState>,
    notice: web::Json<AuthenticationNotice>,
) -> Result<HttpResponse, AppError> {
    let notice = notice.into_inner();
    validate_username(&notice.principal)?;

    state.events.publish(&notice.principal)?;
    info!("Queued authentication event for {}", notice.principal);

    Ok(HttpResponse::Accepted().json(json!({ "status": "accepted" })))
}

pub async fn record_login(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner();
    let user = state.tracker.record_login(&username).await?;

    Ok(HttpResponse::Ok().json(user))
}

pub async fn get_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner();

    match state.store.find_by_username(&username).await? {
        Some(user) => Ok(HttpResponse::Ok().json(user)),
        None => Err(AppError::NotFound(format!("user {}", username))),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/api")
            .route(
                "/authentication-events",
                web::post().to(publish_authentication),
            )
            .service(
                web::scope("/users")
                    .route("/{username}", web::get().to(get_user))
                    .route("/{username}/logins", web::post().to(record_login)),
            )
            .default_service(web::to(|| async { HttpResponse::NotFound().finish() })),
    );
}
