use actix_web::{HttpMessage, HttpRequest};

use crate::utils;

/// Per-request values set by the trace middleware and the handlers.
#[derive(Clone, Debug, Default)]
pub struct RequestExtensions {
    // Handler function name.
    pub handler_fn_name: Option<&'static str>,
    pub request_id: String,
}

impl RequestExtensions {
    pub fn new() -> RequestExtensions {
        RequestExtensions {
            handler_fn_name: None,
            request_id: new_request_id(),
        }
    }
}

/// Request ids are the upper-case hex of the current Unix time in nanoseconds.
pub fn new_request_id() -> String {
    format!("{:X}", utils::now().timestamp_nanos())
}

pub trait RequestExtensionsContext {
    fn ctx(&self) -> RequestExtensions;
    fn set_handler_fn_name(&self, name: &'static str);
}

impl RequestExtensionsContext for HttpRequest {
    fn ctx(&self) -> RequestExtensions {
        self.extensions()
            .get::<RequestExtensions>()
            .cloned()
            .unwrap_or_default()
    }

    fn set_handler_fn_name(&self, name: &'static str) {
        let mut extensions = self.extensions_mut();
        match extensions.get_mut::<RequestExtensions>() {
            Some(ctx) => ctx.handler_fn_name = Some(name),
            None => {
                extensions.insert(RequestExtensions {
                    handler_fn_name: Some(name),
                    request_id: String::new(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn test_handler_fn_name() {
        let req = TestRequest::default().to_http_request();
        assert!(req.ctx().handler_fn_name.is_none());

        req.set_handler_fn_name("TopLocks");
        assert_eq!(req.ctx().handler_fn_name, Some("TopLocks"));

        req.extensions_mut().insert(RequestExtensions::new());
        req.set_handler_fn_name("Heal");
        let ctx = req.ctx();
        assert_eq!(ctx.handler_fn_name, Some("Heal"));
        assert!(!ctx.request_id.is_empty());
    }
}
