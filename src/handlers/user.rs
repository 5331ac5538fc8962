use actix_web::{HttpResponse, ResponseError, Result, web};

use crate::models::*;
use crate::services::LotteryService;

#[utoipa::path(
    get,
    path = "/users/{user_id}/stats",
    tag = "user",
    params(("user_id" = i64, Path, description = "用户ID")),
    responses(
        (status = 200, description = "用户统计", body = UserStatsResponse)
    )
)]
pub async fn get_user_stats(
    lottery_service: web::Data<LotteryService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match lottery_service.user_stats(path.into_inner()).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(ApiResponse::success(stats))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/users").route("/{user_id}/stats", web::get().to(get_user_stats)));
}
