use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 경매 상태 문자열
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_ENDED: &str = "ended";

// 경매 모델
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Auction {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub starting_price: i64,
    pub current_price: i64,
    pub minimum_bid_increment: i64,
    pub expires_at: DateTime<Utc>,
    pub status: String,
    pub final_price: Option<i64>,
    pub owner_id: i64,
    pub highest_bidder_id: Option<i64>,
    /// 낙찰 통보용 연락처 스냅샷(입찰 시점에 복사, 이후 프로필 변경과 무관)
    pub highest_bidder_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

// 입찰 모델
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}
