use actix_web::{HttpResponse, ResponseError, Result, web};

use crate::models::*;
use crate::services::{DrawService, DrawTrigger, LotteryService};

#[utoipa::path(
    post,
    path = "/admin/lotteries",
    tag = "admin",
    request_body = CreateLotteryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "创建成功", body = CreateLotteryResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 401, description = "未授权", body = ApiError)
    )
)]
pub async fn create_lottery(
    lottery_service: web::Data<LotteryService>,
    request: web::Json<CreateLotteryRequest>,
) -> Result<HttpResponse> {
    match lottery_service.create_lottery(request.into_inner()).await {
        Ok(lottery) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            CreateLotteryResponse { id: lottery.id },
            "Lottery created".to_string(),
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/admin/lotteries/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "抽奖ID")),
    request_body = UpdateLotteryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "修改成功", body = LotteryResponse),
        (status = 404, description = "抽奖不存在", body = ApiError),
        (status = 409, description = "已开奖或容量小于已售数量", body = ApiError)
    )
)]
pub async fn update_lottery(
    lottery_service: web::Data<LotteryService>,
    path: web::Path<i64>,
    request: web::Json<UpdateLotteryRequest>,
) -> Result<HttpResponse> {
    match lottery_service
        .update_lottery(path.into_inner(), request.into_inner())
        .await
    {
        Ok(lottery) => Ok(HttpResponse::Ok().json(ApiResponse::success(lottery))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/lotteries/{id}/draw",
    tag = "admin",
    params(("id" = i64, Path, description = "抽奖ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "强制开奖成功", body = DrawResponse),
        (status = 404, description = "抽奖不存在", body = ApiError),
        (status = 409, description = "已开奖或尚无售出票据", body = ApiError),
        (status = 500, description = "票据账本不一致", body = ApiError)
    )
)]
pub async fn force_draw(
    draw_service: web::Data<DrawService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match draw_service
        .draw(path.into_inner(), DrawTrigger::Forced)
        .await
    {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse::success(result))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/lotteries", web::post().to(create_lottery))
            .route("/lotteries/{id}", web::patch().to(update_lottery))
            .route("/lotteries/{id}/draw", web::post().to(force_draw)),
    );
}
