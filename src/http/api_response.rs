use std::convert::Infallible;

use actix_web::body::{BoxBody, MessageBody};
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::web::{Bytes, Data};
use actix_web::{HttpRequest, HttpResponse, Responder};
use futures_core::Stream;
use serde::Serialize;

use super::*;
use crate::errors::{self, ApiError};
use crate::globals::Globals;

pub struct ApiResponse {
    res: HttpResponse,
}

impl ApiResponse {
    pub fn new<B>(status: StatusCode, body: B, mime: Option<mime::Mime>) -> Self
    where
        B: MessageBody + 'static,
    {
        let mut res = HttpResponse::with_body(status, body).map_into_boxed_body();
        if let Some(mime) = mime {
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                res.headers_mut().insert(header::CONTENT_TYPE, value);
            }
        }
        let mut res = ApiResponse { res };
        res.set_common_headers();
        res
    }

    pub fn set_common_headers(&mut self) {
        let headers = self.res.headers_mut();
        headers.insert(header::SERVER, HeaderValue::from_static(SERVER_NAME));
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK, (), None)
    }

    pub fn success_json<T>(data: &T) -> Self
    where
        T: ?Sized + Serialize,
    {
        match serde_json::to_vec(data) {
            Ok(body) => Self::success_json_bytes(body),
            Err(err) => {
                let err = ApiError::InternalError.to_with_err(&err.to_string());
                Self::new(err.http_status_code, err.description, None)
            }
        }
    }

    pub fn success_json_bytes(body: Vec<u8>) -> Self {
        Self::new(StatusCode::OK, body, Some(mime::APPLICATION_JSON))
    }

    pub fn error_json(err: errors::GenericApiError, req: &HttpRequest) -> Self {
        let status_code = err.http_status_code;
        let err_res = error_response(err, req);
        Self::new(
            status_code,
            serde_json::to_string(&err_res).unwrap_or_default(),
            Some(mime::APPLICATION_JSON),
        )
    }

    /// `200 OK` with a body produced chunk by chunk.
    pub fn streaming<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, Infallible>> + 'static,
    {
        let res = HttpResponse::Ok()
            .content_type(mime::APPLICATION_JSON)
            .streaming(stream);
        let mut res = ApiResponse { res };
        res.set_common_headers();
        res
    }

    pub fn status(&self) -> StatusCode {
        self.res.status()
    }

    pub fn into_inner(self) -> HttpResponse {
        self.res
    }
}

/// Error body for `req`, tagged with its path, request id and this node.
pub fn error_response(
    err: errors::GenericApiError,
    req: &HttpRequest,
) -> errors::ApiErrorResponse {
    let request_id = req.ctx().request_id;
    let host_id = req
        .app_data::<Data<Globals>>()
        .map(|g| g.node_name.clone())
        .unwrap_or_default();
    errors::ApiErrorResponse::from(err, req.path().to_owned(), request_id, host_id)
}

impl Responder for ApiResponse {
    type Body = BoxBody;

    #[inline]
    fn respond_to(self, _: &HttpRequest) -> HttpResponse<Self::Body> {
        self.res
    }
}
