pub mod auth;
pub mod health;
pub mod projects;

use actix_web::web;

use crate::{error::ApiError, middleware::AuthPolicy};

pub use auth::{login, signup};
pub use health::health_check;
pub use projects::{add_project, delete_project, list_projects, update_project};

/// Malformed or non-JSON bodies answer 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        log::debug!("Rejected request body: {}", err);
        ApiError::Validation("Invalid JSON payload").into()
    })
}

/// Registers every route. With `require_auth` the project routes demand a
/// bearer token issued by `/login`; paths outside the table still answer 404.
pub fn configure(require_auth: bool) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(json_config())
            .app_data(web::Data::new(AuthPolicy {
                require_token: require_auth,
            }))
            .service(health_check)
            .service(signup)
            .service(login)
            .service(list_projects)
            .service(add_project)
            .service(update_project)
            .service(delete_project);
    }
}
