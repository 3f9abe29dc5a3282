use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;

use actix_web::web::{Bytes, Query};
use actix_web::HttpRequest;
use futures_util::stream;

use crate::admin::error_frame;
use crate::auth::AdminAction;
use crate::errors::{ApiError, GenericApiError};
use crate::globals::Globals;
use crate::http::{ApiResponse, RequestExtensionsContext};
use crate::logger::ErrKind;

/// Names the handler for traces and checks that the caller may run `action`.
pub fn authorize(
    req: &HttpRequest,
    globals: &Globals,
    fn_name: &'static str,
    action: AdminAction,
) -> Result<(), ApiResponse> {
    req.set_handler_fn_name(fn_name);
    globals
        .auth
        .check(req, action)
        .map_err(|err| ApiResponse::error_json(err.to(), req))
}

/// Query parameters of `req`; a malformed query string reads as empty.
pub fn query_map(req: &HttpRequest) -> HashMap<String, String> {
    Query::<HashMap<String, String>>::from_query(req.query_string())
        .map(Query::into_inner)
        .unwrap_or_default()
}

/// Splits the comma separated `paths` value, skipping blanks.
pub fn parse_paths(query: &HashMap<String, String>) -> Vec<String> {
    query
        .get("paths")
        .map(|paths| {
            paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// `logType` value, `ALL` when absent, case insensitive.
pub fn parse_log_kind(query: &HashMap<String, String>) -> Result<ErrKind, ApiError> {
    match query.get("logType").filter(|v| !v.is_empty()) {
        Some(kind) => ErrKind::from_str(&kind.to_uppercase()).map_err(|_| ApiError::InvalidRequest),
        None => Ok(ErrKind::All),
    }
}

/// A streaming response carrying nothing but one error frame.
pub fn terminal_error(err: GenericApiError) -> ApiResponse {
    let frame = error_frame(err);
    ApiResponse::streaming(stream::once(async move { Ok::<_, Infallible>(frame) }))
}

pub async fn not_found_handler(req: HttpRequest) -> ApiResponse {
    req.set_handler_fn_name("NotFound");
    ApiResponse::error_json(ApiError::NotImplemented.to(), &req)
}

/// Single body chunk out of complete frames.
pub fn concat_frames(frames: Vec<Bytes>) -> Bytes {
    let len = frames.iter().map(Bytes::len).sum();
    let mut body = Vec::with_capacity(len);
    for frame in frames {
        body.extend_from_slice(&frame);
    }
    Bytes::from(body)
}

#[cfg(test)]
mod tests {
    use maplit::hashmap;

    use super::*;

    #[test]
    fn test_parse_paths() {
        let query = hashmap! { "paths".to_owned() => "b1/o1, b2/o2,,".to_owned() };
        assert_eq!(parse_paths(&query), vec!["b1/o1", "b2/o2"]);
        assert!(parse_paths(&HashMap::new()).is_empty());
    }

    #[test]
    fn test_parse_log_kind() {
        assert_eq!(parse_log_kind(&HashMap::new()), Ok(ErrKind::All));
        let query = hashmap! { "logType".to_owned() => "application".to_owned() };
        assert_eq!(parse_log_kind(&query), Ok(ErrKind::Application));
        let query = hashmap! { "logType".to_owned() => "minio".to_owned() };
        assert_eq!(parse_log_kind(&query), Err(ApiError::InvalidRequest));
    }
}
