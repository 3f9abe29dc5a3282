use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::{AsError, TypedError};

#[derive(Debug, Clone)]
pub struct GenericApiError {
    pub code: &'static str,
    pub description: String,
    pub http_status_code: StatusCode,
}

#[derive(Debug)]
pub struct GenericApiErrorConst {
    pub code: &'static str,
    pub description: &'static str,
    pub http_status_code: StatusCode,
}

/// Error body written by every admin endpoint, either as the whole
/// response or appended in-band to a response that already started.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub resource: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub request_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub host_id: String,
}

impl ApiErrorResponse {
    pub fn from(
        err: GenericApiError,
        resource: String,
        request_id: String,
        host_id: String,
    ) -> Self {
        ApiErrorResponse {
            code: err.code.to_owned(),
            message: err.description,
            resource,
            request_id,
            host_id,
        }
    }
}

/// Admin API error codes.
#[non_exhaustive]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApiError {
    None,
    AccessDenied,
    InternalError,
    InvalidBucketName,
    InvalidObjectName,
    InvalidRequest,
    NotImplemented,
    MalformedPOSTRequest,
    RequestBodyParse,
    ServerNotInitialized,
    BackendDown,
    Busy,
    AdminInvalidArgument,
    AdminProfilerNotEnabled,
    HealNotImplemented,
    HealNoSuchProcess,
    HealMissingBucket,
    HealAlreadyRunning,
    HealOverlappingPaths,
}

impl ApiError {
    pub fn to_with_err(&self, err: &str) -> GenericApiError {
        self.value().to(Some(err))
    }

    pub fn to(&self) -> GenericApiError {
        self.value().to(None)
    }

    /// Builds the error with `description` replacing the canned one, used
    /// by codes whose message is only known at the call site.
    pub fn to_with_description(&self, description: String) -> GenericApiError {
        GenericApiError {
            code: self.value().code,
            description,
            http_status_code: self.value().http_status_code,
        }
    }
}

impl GenericApiErrorConst {
    const fn new(
        code: &'static str,
        description: &'static str,
        http_status_code: StatusCode,
    ) -> Self {
        GenericApiErrorConst {
            code,
            description,
            http_status_code,
        }
    }

    fn to(&self, err: Option<&str>) -> GenericApiError {
        let mut desc = self.description.to_owned();
        if let Some(err) = err {
            desc = format!("{} ({})", desc, err);
        }
        GenericApiError {
            code: self.code,
            description: desc,
            http_status_code: self.http_status_code,
        }
    }
}

impl ApiError {
    pub fn value(&self) -> &'static GenericApiErrorConst {
        match *self {
            ApiError::None => &INTERNAL_ERROR,
            ApiError::AccessDenied => &ACCESS_DENIED,
            ApiError::InternalError => &INTERNAL_ERROR,
            ApiError::InvalidBucketName => &INVALID_BUCKET_NAME,
            ApiError::InvalidObjectName => &INVALID_OBJECT_NAME,
            ApiError::InvalidRequest => &INVALID_REQUEST,
            ApiError::NotImplemented => &NOT_IMPLEMENTED,
            ApiError::MalformedPOSTRequest => &MALFORMED_POSTREQUEST,
            ApiError::RequestBodyParse => &REQUEST_BODY_PARSE,
            ApiError::ServerNotInitialized => &SERVER_NOT_INITIALIZED,
            ApiError::BackendDown => &BACKEND_DOWN,
            ApiError::Busy => &BUSY,
            ApiError::AdminInvalidArgument => &ADMIN_INVALID_ARGUMENT,
            ApiError::AdminProfilerNotEnabled => &ADMIN_PROFILER_NOT_ENABLED,
            ApiError::HealNotImplemented => &HEAL_NOT_IMPLEMENTED,
            ApiError::HealNoSuchProcess => &HEAL_NO_SUCH_PROCESS,
            ApiError::HealMissingBucket => &HEAL_MISSING_BUCKET,
            ApiError::HealAlreadyRunning => &HEAL_ALREADY_RUNNING,
            ApiError::HealOverlappingPaths => &HEAL_OVERLAPPING_PATHS,
        }
    }
}

/// Maps an internal error onto the admin API error it should be reported as.
pub fn to_admin_api_err(err: &anyhow::Error) -> GenericApiError {
    if let Some(err) = err.as_error::<TypedError>() {
        let code = match err {
            TypedError::ServerNotInitialized => ApiError::ServerNotInitialized,
            TypedError::AccessDenied => ApiError::AccessDenied,
            TypedError::ProfilerNotEnabled => ApiError::AdminProfilerNotEnabled,
            TypedError::BackendDown => ApiError::BackendDown,
            TypedError::UnsupportedProfiler(_) => {
                return ApiError::AdminInvalidArgument.to_with_err(&err.to_string());
            }
            _ => {
                return ApiError::InternalError.to_with_description(err.to_string());
            }
        };
        return code.to();
    }
    ApiError::InternalError.to_with_description(err.to_string())
}

const ACCESS_DENIED: GenericApiErrorConst =
    GenericApiErrorConst::new("AccessDenied", "Access Denied.", StatusCode::FORBIDDEN);
const INTERNAL_ERROR: GenericApiErrorConst = GenericApiErrorConst::new(
    "InternalError",
    "We encountered an internal error, please try again.",
    StatusCode::INTERNAL_SERVER_ERROR,
);
const INVALID_BUCKET_NAME: GenericApiErrorConst = GenericApiErrorConst::new(
    "InvalidBucketName",
    "The specified bucket is not valid.",
    StatusCode::BAD_REQUEST,
);
const NOT_IMPLEMENTED: GenericApiErrorConst = GenericApiErrorConst::new(
    "NotImplemented",
    "A header you provided implies functionality that is not implemented",
    StatusCode::NOT_IMPLEMENTED,
);
const MALFORMED_POSTREQUEST: GenericApiErrorConst = GenericApiErrorConst::new(
    "MalformedPOSTRequest",
    "The body of your POST request is not well-formed multipart/form-data.",
    StatusCode::BAD_REQUEST,
);
const REQUEST_BODY_PARSE: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkRequestBodyParse",
    "The request body failed to parse.",
    StatusCode::BAD_REQUEST,
);
const INVALID_OBJECT_NAME: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkInvalidObjectName",
    "Object name contains unsupported characters.",
    StatusCode::BAD_REQUEST,
);
const SERVER_NOT_INITIALIZED: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkServerNotInitialized",
    "Server not initialized, please try again.",
    StatusCode::SERVICE_UNAVAILABLE,
);
const ADMIN_INVALID_ARGUMENT: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkAdminInvalidArgument",
    "Invalid arguments specified.",
    StatusCode::BAD_REQUEST,
);
const ADMIN_PROFILER_NOT_ENABLED: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkAdminProfilerNotEnabled",
    "Unable to perform the requested operation because profiling is not enabled",
    StatusCode::BAD_REQUEST,
);
// Generic Invalid-Request error. Should be used for response errors only for unlikely
// corner case errors for which introducing new ApiError is not worth it. log_if()
// should be used to log the error at the source of the error for debugging purposes.
const INVALID_REQUEST: GenericApiErrorConst =
    GenericApiErrorConst::new("InvalidRequest", "Invalid Request", StatusCode::BAD_REQUEST);
const HEAL_NOT_IMPLEMENTED: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkHealNotImplemented",
    "This server does not implement heal functionality.",
    StatusCode::BAD_REQUEST,
);
const HEAL_NO_SUCH_PROCESS: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkHealNoSuchProcess",
    "No such heal process is running on the server",
    StatusCode::BAD_REQUEST,
);
const HEAL_MISSING_BUCKET: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkHealMissingBucket",
    "A heal start request with a non-empty object-prefix parameter requires a bucket to be specified.",
    StatusCode::BAD_REQUEST,
);
const HEAL_ALREADY_RUNNING: GenericApiErrorConst =
    GenericApiErrorConst::new("XHulkHealAlreadyRunning", "", StatusCode::BAD_REQUEST);
const HEAL_OVERLAPPING_PATHS: GenericApiErrorConst =
    GenericApiErrorConst::new("XHulkHealOverlappingPaths", "", StatusCode::BAD_REQUEST);
const BACKEND_DOWN: GenericApiErrorConst = GenericApiErrorConst::new(
    "XHulkBackendDown",
    "Object storage backend is unreachable",
    StatusCode::SERVICE_UNAVAILABLE,
);
const BUSY: GenericApiErrorConst = GenericApiErrorConst::new(
    "Busy",
    "The service is unavailable. Please retry.",
    StatusCode::SERVICE_UNAVAILABLE,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_with_err() {
        let err = ApiError::InternalError.to_with_err("disk offline");
        assert_eq!(err.code, "InternalError");
        assert_eq!(
            err.description,
            "We encountered an internal error, please try again. (disk offline)"
        );
        assert_eq!(err.http_status_code, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_to_admin_api_err() {
        let err = anyhow::Error::new(TypedError::ServerNotInitialized);
        assert_eq!(to_admin_api_err(&err).code, "XHulkServerNotInitialized");

        let err = anyhow::Error::new(TypedError::ClusterUnhealthy);
        let api_err = to_admin_api_err(&err);
        assert_eq!(api_err.code, "InternalError");
        assert_eq!(
            api_err.description,
            "all remote servers failed to report heal status, cluster is unhealthy"
        );

        let err = anyhow::anyhow!("boom");
        assert_eq!(to_admin_api_err(&err).description, "boom");
    }
}
