use actix_web::{HttpResponse, ResponseError, Result, web};

use crate::models::*;
use crate::services::{LotteryService, PurchaseService};

#[utoipa::path(
    get,
    path = "/lotteries",
    tag = "lottery",
    responses(
        (status = 200, description = "抽奖列表 (进行中在前)", body = [LotteryResponse])
    )
)]
pub async fn list_lotteries(lottery_service: web::Data<LotteryService>) -> Result<HttpResponse> {
    match lottery_service.list_lotteries().await {
        Ok(list) => Ok(HttpResponse::Ok().json(ApiResponse::success(list))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lotteries/{id}",
    tag = "lottery",
    params(("id" = i64, Path, description = "抽奖ID")),
    responses(
        (status = 200, description = "抽奖详情", body = LotteryResponse),
        (status = 404, description = "抽奖不存在", body = ApiError)
    )
)]
pub async fn get_lottery(
    lottery_service: web::Data<LotteryService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match lottery_service.get_lottery(path.into_inner()).await {
        Ok(lottery) => Ok(HttpResponse::Ok().json(ApiResponse::success(lottery))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lotteries/{id}/result",
    tag = "lottery",
    params(("id" = i64, Path, description = "抽奖ID")),
    responses(
        (status = 200, description = "开奖结果", body = LotteryResultResponse),
        (status = 404, description = "抽奖不存在", body = ApiError)
    )
)]
pub async fn get_result(
    lottery_service: web::Data<LotteryService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match lottery_service.get_result(path.into_inner()).await {
        Ok(result) => Ok(HttpResponse::Ok().json(ApiResponse::success(result))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lotteries/{id}/stats",
    tag = "lottery",
    params(("id" = i64, Path, description = "抽奖ID")),
    responses(
        (status = 200, description = "销售统计", body = LotteryStatsResponse),
        (status = 404, description = "抽奖不存在", body = ApiError)
    )
)]
pub async fn get_stats(
    lottery_service: web::Data<LotteryService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match lottery_service.lottery_stats(path.into_inner()).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(ApiResponse::success(stats))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lotteries/{id}/tickets",
    tag = "lottery",
    params(("id" = i64, Path, description = "抽奖ID")),
    responses(
        (status = 200, description = "已售票据 (按票号排序)", body = [TicketResponse]),
        (status = 404, description = "抽奖不存在", body = ApiError)
    )
)]
pub async fn get_tickets(
    lottery_service: web::Data<LotteryService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match lottery_service.list_tickets(path.into_inner()).await {
        Ok(tickets) => Ok(HttpResponse::Ok().json(ApiResponse::success(tickets))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lotteries/{id}/buy",
    tag = "lottery",
    params(("id" = i64, Path, description = "抽奖ID")),
    request_body = BuyTicketRequest,
    responses(
        (status = 200, description = "购票成功, 售罄时包含开奖结果", body = BuyTicketResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "抽奖不存在", body = ApiError),
        (status = 409, description = "票号已售出 / 超出容量 / 已停止销售", body = ApiError)
    )
)]
pub async fn buy_ticket(
    purchase_service: web::Data<PurchaseService>,
    path: web::Path<i64>,
    request: web::Json<BuyTicketRequest>,
) -> Result<HttpResponse> {
    let request = request.into_inner();
    let profile = request.profile();

    match purchase_service
        .buy_ticket(
            path.into_inner(),
            request.user_id,
            &profile,
            &request.ticket_numbers,
        )
        .await
    {
        Ok(res) => Ok(HttpResponse::Ok().json(ApiResponse::success(res))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn lottery_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/lotteries")
            .route("", web::get().to(list_lotteries))
            .route("/{id}", web::get().to(get_lottery))
            .route("/{id}/result", web::get().to(get_result))
            .route("/{id}/stats", web::get().to(get_stats))
            .route("/{id}/tickets", web::get().to(get_tickets))
            .route("/{id}/buy", web::post().to(buy_ticket)),
    );
}
