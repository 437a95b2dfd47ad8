use crate::{
    api::{attendance, regularization, report},
    auth::middleware::auth_middleware,
    config::Config,
    error::AttendanceError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpRequest, error, middleware::from_fn, web};

// Extractor failures render the same envelope as domain errors
fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AttendanceError::validation(format!("Invalid request body: {err}")).into()
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AttendanceError::validation(format!("Invalid query string: {err}")).into()
}

fn path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    AttendanceError::validation(format!("Invalid path: {err}")).into()
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            (60_000 / requests_per_min as u64).max(1)
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min.max(1))
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap_or_default();
        Governor::new(&cfg)
    }

    let protected_limiter = build_limiter(config.rate_protected_per_min);

    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error));

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    .service(web::resource("/check-in").route(web::post().to(attendance::clock_in)))
                    .service(web::resource("/check-out").route(web::post().to(attendance::clock_out)))
                    .service(
                        web::resource("/break/start").route(web::post().to(attendance::start_break)),
                    )
                    .service(web::resource("/break/end").route(web::post().to(attendance::end_break)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(web::resource("/history").route(web::get().to(attendance::history)))
                    .service(
                        web::resource("/override")
                            .route(web::put().to(attendance::override_attendance)),
                    ),
            )
            .service(
                web::scope("/regularization")
                    // /regularization
                    .service(
                        web::resource("")
                            .route(web::get().to(regularization::list_regularizations))
                            .route(web::post().to(regularization::request_regularization)),
                    )
                    // /regularization/missing
                    .service(
                        web::resource("/missing")
                            .route(web::post().to(regularization::request_missing_attendance)),
                    )
                    // /regularization/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(regularization::get_regularization)),
                    )
                    // /regularization/{id}/approve
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(regularization::approve_regularization)),
                    )
                    // /regularization/{id}/reject
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(regularization::reject_regularization)),
                    ),
            )
            .service(
                web::scope("/reports")
                    .service(web::resource("/daily").route(web::get().to(report::daily_report)))
                    .service(web::resource("/monthly").route(web::get().to(report::monthly_summary))),
            ),
    );
}

// API REQUEST
//  └─ Authorization: Bearer access_token
//       └─ auth_middleware → AuthUser → engine.current_employee → operation(now)
