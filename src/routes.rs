use crate::{
    api::{attendance, department, employee},
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub type RateLimitConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-peer-IP limiter allowing `requests_per_min` with an equal burst.
pub fn rate_limit_config(requests_per_min: u32) -> Option<RateLimitConfig> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiter: &RateLimitConfig) {
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(Governor::new(limiter)) // rate limiting
            .configure(resources),
    );
}

/// Resource routes and extractor error handling, without rate limiting.
pub fn resources(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(web::PathConfig::default().error_handler(|_err, _req| ApiError::NotFound("Record").into()))
    .service(
        web::scope("/departments")
            // /departments
            .service(
                web::resource("")
                    .route(web::get().to(department::list_departments))
                    .route(web::post().to(department::create_department)),
            )
            // /departments/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(department::get_department))
                    .route(web::put().to(department::update_department))
                    .route(web::patch().to(department::patch_department))
                    .route(web::delete().to(department::delete_department)),
            ),
    )
    .service(
        web::scope("/employees")
            // /employees
            .service(
                web::resource("")
                    .route(web::get().to(employee::list_employees))
                    .route(web::post().to(employee::create_employee)),
            )
            // /employees/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(employee::get_employee))
                    .route(web::put().to(employee::update_employee))
                    .route(web::patch().to(employee::patch_employee))
                    .route(web::delete().to(employee::delete_employee)),
            ),
    )
    .service(
        web::scope("/attendances")
            // /attendances
            .service(
                web::resource("")
                    .route(web::get().to(attendance::list_attendances))
                    .route(web::post().to(attendance::create_attendance)),
            )
            // /attendances/{id}
            .service(
                web::resource("/{id}")
                    .route(web::get().to(attendance::get_attendance))
                    .route(web::put().to(attendance::update_attendance))
                    .route(web::patch().to(attendance::patch_attendance))
                    .route(web::delete().to(attendance::delete_attendance)),
            ),
    );
}
