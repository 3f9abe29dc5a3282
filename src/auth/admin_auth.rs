use std::sync::Arc;

use actix_web::http::header;
use actix_web::HttpRequest;
use constant_time_eq::constant_time_eq;
use strum::Display;

use crate::errors::ApiError;

/// Admin operations a request can be authorized for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum AdminAction {
    Heal,
    ServerInfo,
    ServerTrace,
    ConsoleLog,
    TopLocks,
    ForceUnlock,
    ServiceRestart,
    ServiceStop,
    Profiling,
    HealthInfo,
    InspectData,
    // Node-to-node calls on the peer routes.
    Peer,
}

pub trait AdminAuth: Send + Sync {
    /// Validates `req` for `action`, `Err` carries the code to reply with.
    fn check(&self, req: &HttpRequest, action: AdminAction) -> Result<(), ApiError>;
}

/// Accepts every request.
pub struct AllowAll;

impl AdminAuth for AllowAll {
    fn check(&self, _req: &HttpRequest, _action: AdminAction) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Accepts requests carrying `Authorization: Bearer <token>`.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: &str) -> StaticToken {
        StaticToken {
            token: token.to_owned(),
        }
    }
}

impl AdminAuth for StaticToken {
    fn check(&self, req: &HttpRequest, _action: AdminAction) -> Result<(), ApiError> {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::AccessDenied)?;
        if constant_time_eq(token.trim().as_bytes(), self.token.as_bytes()) {
            Ok(())
        } else {
            Err(ApiError::AccessDenied)
        }
    }
}

/// `StaticToken` when a token is configured, `AllowAll` otherwise.
pub fn admin_auth(token: Option<&str>) -> Arc<dyn AdminAuth> {
    match token {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(AllowAll),
    }
}
