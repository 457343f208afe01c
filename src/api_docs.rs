use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::books::list_books,
        api::books::get_book,
        api::books::list_categories,
        // Add other endpoints here as we document them
    ),
    tags(
        (name = "bookstall", description = "Bookstall storefront API")
    )
)]
pub struct ApiDoc;
