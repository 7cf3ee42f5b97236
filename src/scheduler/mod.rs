/// 경매 만료 스윕 스케줄러
/// 요청 트래픽과 무관하게 고정 주기로 만료된 경매를 종료한다.
/// 종료 전이는 조건부 UPDATE 라서 방금 들어온 입찰과 경합해도 안전하다.
// region:    --- Imports
use crate::auction::commands;
use crate::database::DatabaseManager;
use crate::notification::KafkaNotifier;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Auction Scheduler
/// 스윕 주기(초)
const SWEEP_INTERVAL_SECS: u64 = 1;

pub struct AuctionScheduler {
    db_manager: Arc<DatabaseManager>,
    notifier: Arc<KafkaNotifier>,
}

impl AuctionScheduler {
    pub fn new(db_manager: Arc<DatabaseManager>, notifier: Arc<KafkaNotifier>) -> Self {
        Self {
            db_manager,
            notifier,
        }
    }

    /// 스케줄러 시작
    pub async fn start(&self) {
        let db_manager = Arc::clone(&self.db_manager);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                match commands::close_expired_auctions(Utc::now(), &db_manager, &*notifier).await {
                    Ok(closed) if !closed.is_empty() => {
                        debug!(
                            "{:<12} --> 만료 스윕 완료: {}건 종료",
                            "Scheduler",
                            closed.len()
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(
                            "{:<12} --> 만료 스윕 중 오류 발생: {:?}",
                            "Scheduler", e
                        );
                    }
                }
            }
        });
    }
}
// endregion: --- Auction Scheduler
