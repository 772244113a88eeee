#![allow(dead_code)]

use std::time::Duration;

use tracker_server::credentials::CredentialService;

pub const TEST_SECRET: &str = "test-secret";

/// Credential service with the cheapest bcrypt cost.
pub fn credentials() -> CredentialService {
    CredentialService::new(TEST_SECRET, Duration::from_secs(3600))
        .expect("valid credential service")
        .with_cost(4) // bcrypt minimum cost (bcrypt::MIN_COST is private)
}

/// Builds the full route table over `$storage` (any `Storage` value).
macro_rules! init_app {
    ($storage:expr) => {
        init_app!($storage, false)
    };
    ($storage:expr, $require_auth:expr) => {{
        let storage: std::sync::Arc<dyn tracker_server::db::Storage> =
            std::sync::Arc::new($storage);
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::from(storage))
                .app_data(actix_web::web::Data::new(common::credentials()))
                .configure(tracker_server::handlers::configure($require_auth)),
        )
        .await
    }};
}
