/// 경매 관련 커맨드 처리
/// 1. 경매 생성
/// 2. 입찰 (낙관적 동시성)
/// 3. 만료 스윕 / 강제 종료
// region:    --- Imports
use crate::auction::model::{Auction, Bid, STATUS_ACTIVE, STATUS_ENDED};
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::notification::Notifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Commands
/// 경매 생성 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuctionCommand {
    pub name: String,
    pub starting_price: i64,
    #[serde(default)]
    pub minimum_bid_increment: Option<i64>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub image: Option<String>,
}

/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub amount: i64,
}

// 최소 입찰 증분 기본값
const DEFAULT_BID_INCREMENT: i64 = 10;

// 최대 재시도 횟수
const MAX_RETRIES: i32 = 100;

/// 1. 경매 생성
pub async fn handle_create_auction(
    cmd: CreateAuctionCommand,
    owner_id: i64,
    db_manager: &DatabaseManager,
) -> Result<Auction, ApiError> {
    info!("{:<12} --> 경매 생성 요청: {:?}", "Command", cmd);

    if cmd.name.trim().is_empty() {
        return Err(ApiError::Validation("경매 이름이 필요합니다.".into()));
    }
    if cmd.starting_price <= 0 {
        return Err(ApiError::Validation("시작 가격이 올바르지 않습니다.".into()));
    }
    if cmd.expires_at <= Utc::now() {
        return Err(ApiError::Validation("만료 시각은 미래여야 합니다.".into()));
    }
    let increment = cmd.minimum_bid_increment.unwrap_or(DEFAULT_BID_INCREMENT);
    if increment <= 0 {
        return Err(ApiError::Validation("최소 입찰 증분이 올바르지 않습니다.".into()));
    }

    let auction = sqlx::query_as::<_, Auction>(
        "INSERT INTO auctions
            (name, image, starting_price, current_price, minimum_bid_increment, expires_at, status, owner_id)
         VALUES ($1, COALESCE($2, 'https://example.com/default.jpg'), $3, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(&cmd.name)
    .bind(&cmd.image)
    .bind(cmd.starting_price)
    .bind(increment)
    .bind(cmd.expires_at)
    .bind(STATUS_ACTIVE)
    .bind(owner_id)
    .fetch_one(db_manager.pool())
    .await?;

    Ok(auction)
}

/// 입찰 스냅샷 검증
/// 종료 여부와 금액 하한을 스냅샷 기준으로 판정한다.
pub fn validate_bid(auction: &Auction, amount: i64, now: DateTime<Utc>) -> Result<(), ApiError> {
    if auction.status == STATUS_ENDED || now > auction.expires_at {
        return Err(ApiError::AlreadyEnded);
    }
    if amount < auction.current_price + auction.minimum_bid_increment {
        return Err(ApiError::BidTooLow {
            current_price: auction.current_price,
        });
    }
    Ok(())
}

/// 경합 재검증
/// 증분 규칙은 최초 검증 스냅샷 기준이며, CAS 충돌 후에는
/// 단조 증가(금액이 갱신된 현재 가격을 초과)만 다시 확인한다.
/// 동시 입찰 중 금액이 가장 큰 쪽이 항상 최고 입찰자가 된다.
fn revalidate_bid(auction: &Auction, amount: i64, now: DateTime<Utc>) -> Result<(), ApiError> {
    if auction.status == STATUS_ENDED || now > auction.expires_at {
        return Err(ApiError::AlreadyEnded);
    }
    if amount <= auction.current_price {
        return Err(ApiError::BidTooLow {
            current_price: auction.current_price,
        });
    }
    Ok(())
}

/// 2. 입찰
/// 가격 갱신은 스냅샷 가격이 그대로일 때만 커밋되는 조건부 UPDATE 이며,
/// 경합에서 진 쪽은 갱신된 스냅샷으로 재검증 후 재시도하거나 BID_TOO_LOW 로 끝난다.
pub async fn handle_place_bid(
    auction_id: i64,
    bidder_id: i64,
    cmd: PlaceBidCommand,
    db_manager: &DatabaseManager,
) -> Result<(Auction, Bid), ApiError> {
    info!(
        "{:<12} --> 입찰 요청 처리 시작: auction={} bidder={} amount={}",
        "Command", auction_id, bidder_id, cmd.amount
    );

    // 연락처 스냅샷용 이메일 조회
    let bidder_email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
        .bind(bidder_id)
        .fetch_optional(db_manager.pool())
        .await?
        .ok_or(ApiError::NotFound("사용자"))?;

    // 최초 스냅샷 조회 및 검증(증분 규칙 포함)
    let mut auction = sqlx::query_as::<_, Auction>("SELECT * FROM auctions WHERE id = $1")
        .bind(auction_id)
        .fetch_optional(db_manager.pool())
        .await?
        .ok_or(ApiError::NotFound("경매"))?;

    let now = Utc::now();
    validate_bid(&auction, cmd.amount, now)?;

    let mut retries = 0;

    while retries < MAX_RETRIES {
        let snapshot_price = auction.current_price;

        // 조건부 가격 갱신 + 입찰 기록을 하나의 트랜잭션으로 처리
        let mut tx = db_manager.pool().begin().await?;

        let updated = sqlx::query_as::<_, Auction>(
            "UPDATE auctions
             SET current_price = $1, highest_bidder_id = $2, highest_bidder_email = $3
             WHERE id = $4 AND status = $5 AND current_price = $6
             RETURNING *",
        )
        .bind(cmd.amount)
        .bind(bidder_id)
        .bind(&bidder_email)
        .bind(auction_id)
        .bind(STATUS_ACTIVE)
        .bind(snapshot_price)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            // 다른 입찰이 먼저 커밋됨: 갱신된 스냅샷으로 재검증
            tx.rollback().await?;
            warn!(
                "{:<12} --> 낙관적 업데이트로 인한 가격 충돌: 재시도 ({}/{})",
                "Command",
                retries + 1,
                MAX_RETRIES
            );

            auction = sqlx::query_as::<_, Auction>("SELECT * FROM auctions WHERE id = $1")
                .bind(auction_id)
                .fetch_optional(db_manager.pool())
                .await?
                .ok_or(ApiError::NotFound("경매"))?;

            revalidate_bid(&auction, cmd.amount, Utc::now())?;
            retries += 1;
            continue;
        };

        let bid = sqlx::query_as::<_, Bid>(
            "INSERT INTO bids (auction_id, bidder_id, amount, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(auction_id)
        .bind(bidder_id)
        .bind(cmd.amount)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "{:<12} --> 입찰 성공: auction={} 현재 가격 {}",
            "Command", auction_id, updated.current_price
        );
        return Ok((updated, bid));
    }

    Err(ApiError::MaxRetriesExceeded)
}

// endregion: --- Commands

// region:    --- Closure

/// 3-1. 만료 스윕
/// 전이 시점에 status 를 다시 확인하는 조건부 UPDATE 라서 반복 호출해도 안전하다.
pub async fn close_expired_auctions(
    now: DateTime<Utc>,
    db_manager: &DatabaseManager,
    notifier: &impl Notifier,
) -> Result<Vec<Auction>, ApiError> {
    let closed = sqlx::query_as::<_, Auction>(
        "UPDATE auctions
         SET status = $1, final_price = current_price
         WHERE status = $2 AND expires_at <= $3
         RETURNING *",
    )
    .bind(STATUS_ENDED)
    .bind(STATUS_ACTIVE)
    .bind(now)
    .fetch_all(db_manager.pool())
    .await?;

    for auction in &closed {
        info!(
            "{:<12} --> 경매 종료: id={} 최종 가격 {:?}",
            "Command", auction.id, auction.final_price
        );
        notify_winner_best_effort(auction, db_manager, notifier).await;
    }

    Ok(closed)
}

/// 3-2. 강제 종료(단건)
pub async fn force_end_auction(
    auction_id: i64,
    db_manager: &DatabaseManager,
    notifier: &impl Notifier,
) -> Result<Auction, ApiError> {
    info!("{:<12} --> 경매 강제 종료: id={}", "Command", auction_id);

    let updated = sqlx::query_as::<_, Auction>(
        "UPDATE auctions
         SET status = $1, final_price = current_price
         WHERE id = $2 AND status = $3
         RETURNING *",
    )
    .bind(STATUS_ENDED)
    .bind(auction_id)
    .bind(STATUS_ACTIVE)
    .fetch_optional(db_manager.pool())
    .await?;

    match updated {
        Some(auction) => {
            notify_winner_best_effort(&auction, db_manager, notifier).await;
            Ok(auction)
        }
        None => {
            // 존재하지 않는 경매와 이미 종료된 경매를 구분
            let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM auctions WHERE id = $1")
                .bind(auction_id)
                .fetch_optional(db_manager.pool())
                .await?;
            match exists {
                Some(_) => Err(ApiError::AlreadyEnded),
                None => Err(ApiError::NotFound("경매")),
            }
        }
    }
}

/// 3-3. 강제 종료(전체)
/// 현재 활성인 모든 경매를 대상으로 한다. 관리자 전용.
pub async fn force_end_all_active(
    db_manager: &DatabaseManager,
    notifier: &impl Notifier,
) -> Result<Vec<Auction>, ApiError> {
    let closed = sqlx::query_as::<_, Auction>(
        "UPDATE auctions
         SET status = $1, final_price = current_price
         WHERE status = $2
         RETURNING *",
    )
    .bind(STATUS_ENDED)
    .bind(STATUS_ACTIVE)
    .fetch_all(db_manager.pool())
    .await?;

    info!(
        "{:<12} --> 전체 강제 종료: {}건",
        "Command",
        closed.len()
    );

    for auction in &closed {
        notify_winner_best_effort(auction, db_manager, notifier).await;
    }

    Ok(closed)
}

/// 낙찰자 통보 (best-effort)
/// 연락처는 스냅샷 우선, 없으면 사용자 레코드를 조회한다.
/// 통보 실패는 로그만 남기고 종료 전이에는 영향을 주지 않는다.
async fn notify_winner_best_effort(
    auction: &Auction,
    db_manager: &DatabaseManager,
    notifier: &impl Notifier,
) {
    let Some(bidder_id) = auction.highest_bidder_id else {
        info!(
            "{:<12} --> 입찰자 없이 종료된 경매: id={}",
            "Command", auction.id
        );
        return;
    };

    let contact = match &auction.highest_bidder_email {
        Some(email) => Some(email.clone()),
        None => {
            // 스냅샷이 없으면 라이브 조회로 대체
            sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
                .bind(bidder_id)
                .fetch_optional(db_manager.pool())
                .await
                .ok()
                .flatten()
        }
    };

    let Some(contact) = contact else {
        warn!(
            "{:<12} --> 낙찰자 연락처를 찾을 수 없음: auction={}",
            "Command", auction.id
        );
        return;
    };

    let final_price = auction.final_price.unwrap_or(auction.current_price);
    if let Err(e) = notifier
        .notify_winner(&contact, &auction.name, final_price)
        .await
    {
        warn!(
            "{:<12} --> 낙찰 통보 실패(무시): auction={} err={}",
            "Command", auction.id, e
        );
    }
}

// endregion: --- Closure

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_auction(current_price: i64, increment: i64) -> Auction {
        Auction {
            id: 1,
            name: "레고 밀레니엄 팔콘".to_string(),
            image: "https://example.com/default.jpg".to_string(),
            starting_price: 100,
            current_price,
            minimum_bid_increment: increment,
            expires_at: Utc::now() + Duration::hours(1),
            status: STATUS_ACTIVE.to_string(),
            final_price: None,
            owner_id: 1,
            highest_bidder_id: None,
            highest_bidder_email: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn bid_below_increment_rejected() {
        // 시작가 100, 증분 10 에서 105 는 거절
        let auction = sample_auction(100, 10);
        let err = validate_bid(&auction, 105, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::BidTooLow { current_price: 100 }));
    }

    #[test]
    fn bid_at_increment_accepted() {
        let auction = sample_auction(100, 10);
        assert!(validate_bid(&auction, 110, Utc::now()).is_ok());
        assert!(validate_bid(&auction, 125, Utc::now()).is_ok());
    }

    #[test]
    fn bid_against_stale_snapshot_rejected() {
        // 경합에서 진 쪽이 갱신된 가격(125)으로 재검증하면 120 은 거절
        let auction = sample_auction(125, 10);
        let err = validate_bid(&auction, 120, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::BidTooLow { current_price: 125 }));
    }

    #[test]
    fn bid_on_ended_auction_rejected() {
        let mut auction = sample_auction(100, 10);
        auction.status = STATUS_ENDED.to_string();
        let err = validate_bid(&auction, 200, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::AlreadyEnded));
    }

    #[test]
    fn bid_after_expiry_rejected() {
        let mut auction = sample_auction(100, 10);
        auction.expires_at = Utc::now() - Duration::seconds(1);
        let err = validate_bid(&auction, 200, Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::AlreadyEnded));
    }

    #[test]
    fn revalidation_keeps_strictly_higher_concurrent_bid() {
        // 110 스냅샷에서 검증된 125 는 120 이 먼저 커밋돼도 살아남는다
        let auction = sample_auction(120, 10);
        assert!(revalidate_bid(&auction, 125, Utc::now()).is_ok());
    }

    #[test]
    fn revalidation_rejects_lower_or_equal_concurrent_bid() {
        let auction = sample_auction(125, 10);
        assert!(matches!(
            revalidate_bid(&auction, 120, Utc::now()),
            Err(ApiError::BidTooLow { current_price: 125 })
        ));
        assert!(matches!(
            revalidate_bid(&auction, 125, Utc::now()),
            Err(ApiError::BidTooLow { current_price: 125 })
        ));
    }

    #[test]
    fn revalidation_rejects_after_closure() {
        let mut auction = sample_auction(120, 10);
        auction.status = STATUS_ENDED.to_string();
        assert!(matches!(
            revalidate_bid(&auction, 125, Utc::now()),
            Err(ApiError::AlreadyEnded)
        ));
    }
}
// endregion: --- Tests
