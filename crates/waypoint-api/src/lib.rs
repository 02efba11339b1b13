pub mod api;
pub mod dto;
pub mod error;
pub mod healthcheck;
pub mod metrics;

pub use api::OrchestrationApi;
pub use error::OrchestrationApiError;
pub use metrics::ApiMetrics;

use poem::Route;
use poem_openapi::OpenApiService;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

type ApiServices = (OrchestrationApi, healthcheck::HealthcheckApi);

pub fn make_open_api_service(orchestration_api: OrchestrationApi) -> OpenApiService<ApiServices, ()> {
    OpenApiService::new(
        (orchestration_api, healthcheck::HealthcheckApi),
        "Waypoint Orchestrator API",
        VERSION,
    )
}

/// Nests the generated OpenAPI routes plus Swagger UI and the raw spec,
/// mirroring the teacher's `combined_routes` convention.
pub fn combined_routes(orchestration_api: OrchestrationApi) -> Route {
    let api_service = make_open_api_service(orchestration_api);
    let ui = api_service.swagger_ui();
    let spec = api_service.spec_endpoint_yaml();

    Route::new()
        .nest("/", api_service)
        .nest("/docs", ui)
        .nest("/specs", spec)
}
