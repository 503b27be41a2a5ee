//! OpenAPI/Swagger documentation configuration.
//!
//! The generated document covers the provisioning endpoint and is served
//! with a Scalar UI at `/docs` (see [`crate::build_router`]).

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Security scheme for the provisioning API (Bearer token only).
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token of an administrator, as issued by the identity store:\n\n\
                            ```\nAuthorization: Bearer YOUR_ACCESS_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Usher API",
        description = "Privileged account provisioning across the identity and profile services."
    ),
    modifiers(&SecurityAddon),
    paths(api::handlers::users::create_user),
    components(schemas(
        api::models::users::UserCreate,
        api::models::users::UserCreateResponse,
        api::models::users::Role,
        api::models::users::AccountStatus,
    )),
    tags(
        (name = "users", description = "Account provisioning")
    )
)]
pub struct ApiDoc;
