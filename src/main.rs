use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;
use std::time::Duration;

use lottery_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::TelegramService,
    handlers,
    middlewares::{AdminGuard, create_cors},
    services::*,
    swagger::swagger_config,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // 外部服务: 随机数 + 通知
    let random_source = RandomSource::new(&config.random_org, config.shortener.clone())
        .expect("Failed to create random source");

    let telegram = TelegramService::new(config.telegram.clone())
        .expect("Failed to create Telegram client");
    let transport: Option<Arc<dyn MessageTransport>> = if telegram.is_enabled() {
        Some(Arc::new(telegram))
    } else {
        log::warn!("BOT_TOKEN not set, draw notifications are disabled");
        None
    };
    let notifier = NotificationService::new(
        transport,
        config.telegram.admin_chat_id,
        Duration::from_secs(config.telegram.send_timeout_secs),
    );

    // 创建服务
    let ledger = LedgerService::new(pool.clone());
    let draw_service = DrawService::new(pool.clone(), ledger.clone(), random_source, notifier);
    let lottery_service = LotteryService::new(
        pool.clone(),
        ledger.clone(),
        draw_service.clone(),
        config.lottery.clone(),
    );
    let purchase_service =
        PurchaseService::new(ledger.clone(), draw_service.clone(), lottery_service.clone());

    // 上次进程中断的开奖
    if let Err(e) = lottery_service.recover_interrupted_draws().await {
        log::error!("Failed to recover interrupted draws: {:?}", e);
    }

    if config.admin.token.is_empty() {
        log::warn!("ADMIN_TOKEN not set, admin API is disabled");
    }
    let admin_token = config.admin.token.clone();

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AdminGuard::new(admin_token.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(lottery_service.clone()))
            .app_data(web::Data::new(purchase_service.clone()))
            .app_data(web::Data::new(draw_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::lottery_config)
                    .configure(handlers::user_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
