// region:    --- Imports
use super::queries;
use crate::auction::model::{Auction, Bid};
use crate::database::DatabaseManager;
use crate::payment::model::Payment;
use chrono::{DateTime, Utc};
use sqlx::Error as SqlxError;
use sqlx::Row;
use tracing::info;

// endregion: --- Imports

// region:    --- Auction Queries

/// 경매 목록 조회
pub async fn get_all_auctions(db_manager: &DatabaseManager) -> Result<Vec<Auction>, SqlxError> {
    info!("{:<12} --> 경매 목록 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::GET_ALL_AUCTIONS)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 경매 조회
pub async fn get_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Auction>, SqlxError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 입찰 이력 조회
pub async fn get_bid_history(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Vec<Bid>, SqlxError> {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_BID_HISTORY)
                    .bind(auction_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 최고 입찰가 조회
pub async fn get_highest_bid(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<i64>, SqlxError> {
    info!("{:<12} --> 최고 입찰가 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let result = sqlx::query(queries::GET_HIGHEST_BID)
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await?;

                Ok(result.get("highest_bid"))
            })
        })
        .await
}

// endregion: --- Auction Queries

// region:    --- Payment Queries

/// 결제 조회
pub async fn get_payment(
    db_manager: &DatabaseManager,
    payment_id: i64,
) -> Result<Option<Payment>, SqlxError> {
    info!("{:<12} --> 결제 조회 id: {}", "Query", payment_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Payment>(queries::GET_PAYMENT)
                    .bind(payment_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 경매 기준 최신 결제 조회
pub async fn get_latest_payment_by_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Payment>, SqlxError> {
    info!(
        "{:<12} --> 경매 기준 결제 조회 auction: {}",
        "Query", auction_id
    );
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Payment>(queries::GET_LATEST_PAYMENT_BY_AUCTION)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 구매자 결제 이력 조회
pub async fn get_my_payments(
    db_manager: &DatabaseManager,
    user_id: i64,
) -> Result<Vec<Payment>, SqlxError> {
    info!("{:<12} --> 결제 이력 조회 user: {}", "Query", user_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Payment>(queries::GET_MY_PAYMENTS)
                    .bind(user_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 심사 대기 결제 조회(관리자)
pub async fn get_pending_payments(
    db_manager: &DatabaseManager,
) -> Result<Vec<Payment>, SqlxError> {
    info!("{:<12} --> 심사 대기 결제 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Payment>(queries::GET_PENDING_PAYMENTS)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 기간 내 결제 완료 건 조회(관리자)
pub async fn get_paid_payments_by_range(
    db_manager: &DatabaseManager,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Payment>, SqlxError> {
    info!(
        "{:<12} --> 기간 내 결제 완료 조회: {} ~ {}",
        "Query", start, end
    );
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Payment>(queries::GET_PAID_PAYMENTS_BY_RANGE)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

// endregion: --- Payment Queries
