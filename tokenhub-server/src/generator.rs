use axum::{extract::State, routing::{get, post}, Json};
use tokenhub_core::ServiceFee;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    navigation::Route,
    schemas::{GenerateSchema, ValidatedJson},
    serialized::{GeneratedImage, Service},
    Router,
};

fn route_of(service: ServiceFee) -> Route {
    match service {
        ServiceFee::PhotoProduct => Route::Product,
        ServiceFee::FashionPhotography => Route::Fashion,
        ServiceFee::AnimalPhotography => Route::Animals,
        ServiceFee::FoodPhotography => Route::Food,
        ServiceFee::PhotoModification => Route::Modify,
    }
}

#[utoipa::path(
    get,
    path = "/v1/services",
    tag = "generator",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Service>)
    )
)]
async fn services(session: Session) -> ServerResult<Json<Vec<Service>>> {
    let mut services = vec![];

    for service in ServiceFee::ALL {
        let route = route_of(service);

        services.push(Service {
            key: service.as_str().to_string(),
            label: service.label().to_string(),
            path: route.path().to_string(),
            fee: session.settings().service_fee(service).await?,
            available: !route.is_placeholder(),
        });
    }

    Ok(Json(services))
}

#[utoipa::path(
    post,
    path = "/v1/generate",
    tag = "generator",
    request_body = GenerateSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = GeneratedImage),
        (status = 422, description = "The description is empty or no tokens are available"),
        (status = 502, description = "The image could not be generated")
    )
)]
async fn generate(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<GenerateSchema>,
) -> ServerResult<Json<GeneratedImage>> {
    let user = session.user()?;
    let url = context.generator.generate_for(&user, &body.description).await?;

    Ok(Json(GeneratedImage { url }))
}

pub fn router() -> Router {
    Router::new()
        .route("/services", get(services))
        .route("/generate", post(generate))
}
