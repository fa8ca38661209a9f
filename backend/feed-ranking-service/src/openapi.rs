use utoipa::openapi::{InfoBuilder, OpenApi, OpenApiBuilder, Paths};

/// Minimal OpenAPI specification for the Feed Ranking Service.
pub fn doc() -> OpenApi {
    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title("Encore Feed Ranking Service API")
                .version("1.0.0")
                .description(Some(
                    "Personalized event feed ranking endpoints for the Encore platform.",
                ))
                .build(),
        )
        .paths(Paths::new())
        .build()
}
