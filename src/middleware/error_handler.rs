use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    web, HttpRequest,
};

use crate::core::AppError;

/// Extractor configs that report malformed input in the crate's error body
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler));
}

pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log_error(req, &err);
    AppError::validation(format!("Invalid JSON body: {}", err)).into()
}

pub fn path_error_handler(err: PathError, req: &HttpRequest) -> actix_web::Error {
    log_error(req, &err);
    AppError::validation(format!("Invalid path parameter: {}", err)).into()
}

pub fn query_error_handler(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    log_error(req, &err);
    AppError::validation(format!("Invalid query string: {}", err)).into()
}

pub fn log_error(req: &HttpRequest, err: &dyn std::fmt::Display) {
    tracing::warn!(
        method = %req.method(),
        path = %req.path(),
        error = %err,
        "Rejected malformed request"
    );
}
