//! Shared application state and route table.

use actix_web::{web, HttpRequest};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::Store;
use crate::errors::AppError;
use crate::handlers;
use crate::utils::auth::{validator, RevocationList};
use crate::utils::jwt::TokenService;
use crate::utils::mailer::Mailer;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub revocations: RevocationList,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = TokenService::from_config(&config);
        let cache_ttl = Duration::from_secs(config.access_token_ttl_minutes.max(1) as u64 * 60);
        let revocations = RevocationList::new(store.clone(), cache_ttl);
        Self {
            config,
            store,
            tokens,
            revocations,
            mailer,
        }
    }
}

/// Periodically drops blacklist entries whose tokens have expired anyway.
pub fn spawn_blacklist_pruner(state: web::Data<AppState>) {
    let period = Duration::from_secs(state.config.blacklist_prune_interval_secs.max(1));
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(period);
        loop {
            ticker.tick().await;
            match state.revocations.prune(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => log::info!("Pruned {} expired blacklisted tokens", removed),
                Err(err) => log::warn!("Blacklist pruning failed: {}", err),
            }
        }
    });
}

fn bad_request<E: std::fmt::Display>(err: E, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(err.to_string()).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Authentication middleware
    let auth = HttpAuthentication::with_fn(validator);

    cfg.app_data(web::JsonConfig::default().error_handler(bad_request))
        .app_data(web::FormConfig::default().error_handler(bad_request))
        .app_data(web::QueryConfig::default().error_handler(bad_request))
        .app_data(web::PathConfig::default().error_handler(bad_request))
        .service(
            web::scope("/auth")
                .route("/register", web::post().to(handlers::auth::register))
                .route("/check-username", web::get().to(handlers::auth::check_username))
                .route("/check-email", web::get().to(handlers::auth::check_email))
                .route("/token", web::post().to(handlers::auth::login))
                .route("/refresh", web::post().to(handlers::auth::refresh))
                .service(
                    web::resource("/logout")
                        .wrap(auth.clone())
                        .route(web::post().to(handlers::auth::logout)),
                ),
        )
        .service(
            web::scope("/users")
                .wrap(auth.clone())
                .route("/me", web::get().to(handlers::profile::get_profile))
                .route("/profile-status", web::get().to(handlers::profile::profile_status))
                .route("/update-profile", web::post().to(handlers::profile::update_profile))
                .route("/set-program", web::post().to(handlers::profile::set_program))
                .route("/set-location", web::post().to(handlers::profile::set_location))
                .route("/set-experience", web::post().to(handlers::profile::set_experience))
                .route("/update-training-program", web::post().to(handlers::profile::set_program))
                .route("/update-training-location", web::post().to(handlers::profile::set_location))
                .route("/update-training-experience", web::post().to(handlers::profile::set_experience))
                .route("/change-password", web::post().to(handlers::profile::change_password))
                .route("/delete-account", web::delete().to(handlers::profile::delete_account))
                .route("/upload-avatar", web::post().to(handlers::file::upload_avatar))
                .route("/delete-avatar", web::delete().to(handlers::file::delete_avatar)),
        )
        .service(
            web::scope("/plan").wrap(auth.clone()).service(
                web::resource(["", "/"])
                    .route(web::get().to(handlers::plan::get_plan))
                    .route(web::post().to(handlers::plan::save_plan))
                    .route(web::delete().to(handlers::plan::delete_plan)),
            ),
        )
        .service(
            web::scope("/progress")
                .wrap(auth.clone())
                .service(
                    web::resource(["", "/"])
                        .route(web::get().to(handlers::progress::list_progress))
                        .route(web::post().to(handlers::progress::upsert_progress))
                        .route(web::delete().to(handlers::progress::clear_progress)),
                )
                .route("/{day_index}", web::get().to(handlers::progress::day_progress)),
        )
        .service(
            web::scope("/water")
                .wrap(auth.clone())
                .route("/history", web::get().to(handlers::water::history))
                .service(
                    web::resource("/daily/{date}")
                        .route(web::get().to(handlers::water::daily))
                        .route(web::delete().to(handlers::water::clear_day)),
                )
                .route("/add", web::post().to(handlers::water::add_intake))
                .route("/records", web::post().to(handlers::water::add_record))
                .route("/records/{record_id}", web::delete().to(handlers::water::delete_record))
                .route("/all", web::delete().to(handlers::water::clear_all)),
        )
        .service(
            web::scope("/password")
                .route("/forgot", web::post().to(handlers::password_reset::forgot_password))
                .route("/verify", web::post().to(handlers::password_reset::verify_reset_code))
                .route("/reset", web::post().to(handlers::password_reset::reset_password)),
        )
        .service(
            web::scope("/verify-email")
                .route("/send", web::post().to(handlers::email_verification::send_code))
                .route("/verify", web::post().to(handlers::email_verification::verify_code)),
        );
}
