// region:    --- Imports
use crate::blob_store::{BlobStore, LocalDiskStore};
use crate::database::DatabaseManager;
use crate::handlers::AppState;
use crate::message_broker::KafkaManager;
use crate::notification::{KafkaNotifier, NOTIFICATIONS_TOPIC};
use crate::session::{InMemorySessionStore, SessionStore};
use axum::extract::DefaultBodyLimit;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Modules
mod auction;
mod blob_store;
mod database;
mod error;
mod handlers;
mod message_broker;
mod notification;
mod payment;
mod query;
mod scheduler;
mod session;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new().await);

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // Kafka 프로듀서 생성 (알림 사이드 채널)
    let kafka_manager = Arc::new(KafkaManager::new());
    if let Err(e) = kafka_manager.create_topic(NOTIFICATIONS_TOPIC, 1, 1).await {
        // 알림 채널 준비 실패는 서비스 기동을 막지 않는다
        warn!("{:<12} --> 알림 토픽 준비 실패(계속 진행): {}", "Main", e);
    }
    let notifier = Arc::new(KafkaNotifier::new(kafka_manager.get_producer()));

    // 만료 스윕 스케줄러 시작
    let scheduler = scheduler::AuctionScheduler::new(Arc::clone(&db_manager), Arc::clone(&notifier));
    scheduler.start().await;

    // 세션 저장소 및 업로드 저장소
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let blob_store: Arc<dyn BlobStore> = Arc::new(LocalDiskStore::new("uploads/slips"));

    let state = AppState {
        db_manager,
        notifier,
        sessions,
        blob_store,
    };

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let routes_all = handlers::routes(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 20)); // 슬립 이미지 업로드를 위한 바디 사이즈(20MB)

    // 리스너 생성
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
