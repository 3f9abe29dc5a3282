use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::web::{self, Data};
use actix_web::App;

use super::utils::not_found_handler;
use super::*;
use crate::globals::Globals;

// Configure server http handler.
pub fn configure_server_handler(
    globals: Data<Globals>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let trace = middlewares::Trace::new(&globals);
    App::new()
        .app_data(globals)
        .configure(configure_admin_router)
        .configure(configure_peer_router)
        .default_service(web::to(not_found_handler))
        .wrap(trace)
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::Config;
    use crate::errors::ApiErrorResponse;

    #[actix_rt::test]
    async fn test_server_handler() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let globals = Data::new(Globals::new(Config::default(), tx));
        let app = test::init_service(configure_server_handler(globals.clone())).await;

        let req = test::TestRequest::get().uri("/photos/a.png").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 501);
        assert!(res.headers().contains_key("x-amz-request-id"));
        let body = test::read_body(res).await;
        let err: ApiErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, "NotImplemented");

        // No backend configured.
        let req = test::TestRequest::get()
            .uri("/hulk/admin/v3/storageinfo")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 503);

        let req = test::TestRequest::get().uri("/hulk/peer/v1/locks").to_request();
        let res = test::call_service(&app, req).await;
        assert!(res.status().is_success());

        let stats = globals.http_stats.snapshot();
        assert_eq!(stats.total_requests.values().sum::<u64>(), 3);
        assert_eq!(stats.total_errors.values().sum::<u64>(), 2);
    }
}
