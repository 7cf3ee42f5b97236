/// 경매 목록 조회
pub const GET_ALL_AUCTIONS: &str = "SELECT * FROM auctions ORDER BY created_at DESC";

/// 경매 조회
pub const GET_AUCTION: &str = "SELECT * FROM auctions WHERE id = $1";

/// 입찰 이력 조회
pub const GET_BID_HISTORY: &str = r#"
    SELECT id, auction_id, bidder_id, amount, created_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY created_at DESC, id DESC
"#;

/// 최고 입찰 조회
pub const GET_HIGHEST_BID: &str =
    "SELECT MAX(amount) as highest_bid FROM bids WHERE auction_id = $1";

/// 결제 조회
pub const GET_PAYMENT: &str = "SELECT * FROM payments WHERE id = $1";

/// 경매 기준 최신 결제 조회
pub const GET_LATEST_PAYMENT_BY_AUCTION: &str = r#"
    SELECT * FROM payments
    WHERE auction_id = $1
    ORDER BY created_at DESC, id DESC
    LIMIT 1
"#;

/// 구매자 결제 이력 조회
pub const GET_MY_PAYMENTS: &str =
    "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at DESC";

/// 심사 대기 결제 조회
pub const GET_PENDING_PAYMENTS: &str = r#"
    SELECT * FROM payments
    WHERE status IN ('pending', 'uploaded')
    ORDER BY created_at DESC
"#;

/// 기간 내 결제 완료 건 조회
pub const GET_PAID_PAYMENTS_BY_RANGE: &str = r#"
    SELECT * FROM payments
    WHERE is_paid = true
      AND payment_confirmed_at >= $1
      AND payment_confirmed_at <= $2
    ORDER BY payment_confirmed_at DESC
"#;
