// Request id set on every response.
pub const AMZ_REQUEST_ID: &str = "x-amz-request-id";

pub const SERVER_NAME: &str = "Hulk";
