use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Herald API",
        version = "0.1.0",
        description = "Read-only access to remote build results recorded by Herald."
    ),
    paths(
        crate::routes::list_records,
        crate::routes::get_result,
        crate::routes::get_env,
        crate::routes::list_jobs,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::BuildResponse,
        crate::dto::RecordResponse,
        crate::dto::RecordListResponse,
        crate::dto::EnvResponse,
        crate::dto::JobEntryResponse,
        crate::dto::JobListResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "records", description = "Persisted job result records"),
        (name = "env", description = "Exported environment variables"),
        (name = "jobs", description = "Remote job manifest"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the Bearer token security scheme to the OpenAPI document.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Read API key. Set via HERALD_SERVER_API_KEY environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
