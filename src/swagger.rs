use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::LotteryStatus;
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::lottery::list_lotteries,
        handlers::lottery::get_lottery,
        handlers::lottery::get_result,
        handlers::lottery::get_stats,
        handlers::lottery::get_tickets,
        handlers::lottery::buy_ticket,
        handlers::user::get_user_stats,
        handlers::admin::create_lottery,
        handlers::admin::update_lottery,
        handlers::admin::force_draw,
    ),
    components(
        schemas(
            LotteryStatus,
            LotteryResponse,
            LotteryResultResponse,
            LotteryStatsResponse,
            TicketResponse,
            BuyTicketRequest,
            BuyTicketResponse,
            BuyerProfile,
            DrawResponse,
            CreateLotteryRequest,
            CreateLotteryResponse,
            UpdateLotteryRequest,
            UserStatsResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "lottery", description = "Lottery and ticket API"),
        (name = "user", description = "User statistics API"),
        (name = "admin", description = "Operator API"),
    ),
    info(
        title = "Lottery Backend API",
        version = "1.0.0",
        description = "Numbered-ticket lottery REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_lottery_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/lotteries",
            "/lotteries/{id}/buy",
            "/users/{user_id}/stats",
            "/admin/lotteries/{id}/draw",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
