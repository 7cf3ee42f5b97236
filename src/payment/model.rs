use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 결제 상태 문자열
pub const PAY_PENDING: &str = "pending";
pub const PAY_UPLOADED: &str = "uploaded";
pub const PAY_APPROVED: &str = "approved";
pub const PAY_REJECTED: &str = "rejected";
pub const PAY_COMPLETED: &str = "completed";

/// 배송 상태 문자열
pub const SHIP_NOT_SENT: &str = "not_sent";
pub const SHIP_SHIPPED: &str = "shipped";
pub const SHIP_DELIVERED: &str = "delivered";
pub const SHIP_COMPLETED: &str = "completed";

/// 배송 상태 순위: not_sent → shipped → delivered → completed
/// 알 수 없는 값은 None.
pub fn shipping_rank(status: &str) -> Option<u8> {
    match status {
        SHIP_NOT_SENT => Some(0),
        SHIP_SHIPPED => Some(1),
        SHIP_DELIVERED => Some(2),
        SHIP_COMPLETED => Some(3),
        _ => None,
    }
}

// 결제 모델: 낙찰 건 하나의 결제-배송 수명주기 기록
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub auction_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub qr_payload: String,
    pub slip_image: Option<String>,
    pub status: String,
    pub shipping_status: String,
    pub tracking_number: Option<String>,
    /// 배송지 스냅샷(생성/수정 시점에 프로필에서 복사)
    pub shipping_address: Option<String>,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub note: String,
    pub is_paid: bool,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub delivery_confirmed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipping_rank_is_forward_ordered() {
        assert!(shipping_rank(SHIP_NOT_SENT) < shipping_rank(SHIP_SHIPPED));
        assert!(shipping_rank(SHIP_SHIPPED) < shipping_rank(SHIP_DELIVERED));
        assert!(shipping_rank(SHIP_DELIVERED) < shipping_rank(SHIP_COMPLETED));
    }

    #[test]
    fn unknown_status_has_no_rank() {
        assert_eq!(shipping_rank("returned"), None);
        assert_eq!(shipping_rank(""), None);
    }
}
// endregion: --- Tests
