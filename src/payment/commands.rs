/// 결제 관련 커맨드 처리
/// 1. QR 생성 (멱등)
/// 2. 슬립 업로드 / 승인 / 거절
/// 3. 배송 상태 / 배송지 / 수취 확인
// region:    --- Imports
use crate::auction::model::Auction;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::notification::Notifier;
use crate::payment::model::{
    shipping_rank, Payment, PAY_APPROVED, PAY_COMPLETED, PAY_REJECTED, PAY_UPLOADED,
    SHIP_COMPLETED, SHIP_DELIVERED,
};
use crate::payment::promptpay;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Commands
/// QR 생성 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQrCommand {
    pub auction_id: i64,
}

/// 배송 상태 갱신 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShippingStatusCommand {
    pub shipping_status: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// 배송지 갱신 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdateShippingAddressCommand {
    pub address: String,
    #[serde(default)]
    pub note: Option<String>,
}

// 생성된 QR 의 유효 시간
const QR_TTL_MINUTES: i64 = 15;

/// 구매자 기본 배송지 스냅샷(기본 주소 우선, 없으면 첫 주소)
struct BuyerSnapshot {
    address: Option<String>,
    name: String,
    phone: String,
}

async fn buyer_snapshot(
    db_manager: &DatabaseManager,
    user_id: i64,
) -> Result<BuyerSnapshot, ApiError> {
    let addr = sqlx::query_as::<_, (String, String, String)>(
        "SELECT a.full_address, a.name, a.phone
         FROM addresses a
         JOIN profiles p ON a.profile_id = p.id
         WHERE p.user_id = $1
         ORDER BY a.is_default DESC, a.id ASC
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db_manager.pool())
    .await?;

    if let Some((full_address, name, phone)) = addr {
        return Ok(BuyerSnapshot {
            address: Some(full_address),
            name,
            phone,
        });
    }

    // 주소가 없으면 프로필/사용자 연락처로 대체
    let fallback = sqlx::query_as::<_, (Option<String>, Option<String>)>(
        "SELECT p.name, COALESCE(p.phone, u.phone)
         FROM users u
         LEFT JOIN profiles p ON p.user_id = u.id
         WHERE u.id = $1",
    )
    .bind(user_id)
    .fetch_optional(db_manager.pool())
    .await?;

    let (name, phone) = fallback.unwrap_or((None, None));
    Ok(BuyerSnapshot {
        address: None,
        name: name.unwrap_or_default(),
        phone: phone.unwrap_or_default(),
    })
}

/// 미결제 레코드 조회 (auction, buyer) 쌍에 is_paid=false 는 최대 1건
async fn find_unpaid(
    db_manager: &DatabaseManager,
    auction_id: i64,
    user_id: i64,
) -> Result<Option<Payment>, ApiError> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments
         WHERE auction_id = $1 AND user_id = $2 AND is_paid = false",
    )
    .bind(auction_id)
    .bind(user_id)
    .fetch_optional(db_manager.pool())
    .await?;
    Ok(payment)
}

/// 1. 결제 QR 생성
/// 미결제 레코드가 이미 있으면 그대로 반환한다(중복 QR 없음).
/// 삽입 경합은 부분 유니크 인덱스 위반(23505)을 잡아 재조회로 해소한다.
pub async fn handle_generate_qr(
    cmd: GenerateQrCommand,
    db_manager: &DatabaseManager,
) -> Result<Payment, ApiError> {
    info!(
        "{:<12} --> 결제 QR 생성 요청: auction={}",
        "Command", cmd.auction_id
    );

    let auction = sqlx::query_as::<_, Auction>("SELECT * FROM auctions WHERE id = $1")
        .bind(cmd.auction_id)
        .fetch_optional(db_manager.pool())
        .await?
        .ok_or(ApiError::NotFound("경매"))?;

    let winner_id = auction.highest_bidder_id.ok_or(ApiError::MissingPayoutInfo)?;

    // 판매자 수취 식별자: 프로필의 프롬프트페이 ID, 없으면 전화번호
    let payout_target = sqlx::query_scalar::<_, Option<String>>(
        "SELECT COALESCE(p.promptpay_id, u.phone)
         FROM users u
         LEFT JOIN profiles p ON p.user_id = u.id
         WHERE u.id = $1",
    )
    .bind(auction.owner_id)
    .fetch_optional(db_manager.pool())
    .await?
    .flatten()
    .ok_or(ApiError::MissingPayoutInfo)?;

    // 멱등 처리: 기존 미결제 레코드 재사용
    if let Some(existing) = find_unpaid(db_manager, cmd.auction_id, winner_id).await? {
        info!(
            "{:<12} --> 기존 미결제 레코드 재사용: payment={}",
            "Command", existing.id
        );
        return Ok(existing);
    }

    let qr_payload = promptpay::generate_payload(&payout_target, Some(auction.current_price))
        .ok_or(ApiError::MissingPayoutInfo)?;

    let snapshot = buyer_snapshot(db_manager, winner_id).await?;
    let expires_at = Utc::now() + Duration::minutes(QR_TTL_MINUTES);

    let inserted = sqlx::query_as::<_, Payment>(
        "INSERT INTO payments
            (auction_id, user_id, amount, qr_payload,
             shipping_address, recipient_name, recipient_phone, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(cmd.auction_id)
    .bind(winner_id)
    .bind(auction.current_price)
    .bind(&qr_payload)
    .bind(&snapshot.address)
    .bind(&snapshot.name)
    .bind(&snapshot.phone)
    .bind(expires_at)
    .fetch_one(db_manager.pool())
    .await;

    match inserted {
        Ok(payment) => Ok(payment),
        Err(e) if e.as_database_error().is_some_and(|d| d.is_unique_violation()) => {
            // 동시 요청이 먼저 삽입함: 그 레코드를 반환
            warn!(
                "{:<12} --> 미결제 유니크 충돌: 기존 레코드 재조회 auction={}",
                "Command", cmd.auction_id
            );
            find_unpaid(db_manager, cmd.auction_id, winner_id)
                .await?
                .ok_or_else(|| ApiError::Internal("결제 레코드 재조회 실패".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// 2-1. 슬립 업로드
pub async fn handle_upload_slip(
    payment_id: i64,
    image_ref: &str,
    db_manager: &DatabaseManager,
) -> Result<Payment, ApiError> {
    let payment = sqlx::query_as::<_, Payment>(
        "UPDATE payments SET slip_image = $1, status = $2 WHERE id = $3 RETURNING *",
    )
    .bind(image_ref)
    .bind(PAY_UPLOADED)
    .bind(payment_id)
    .fetch_optional(db_manager.pool())
    .await?
    .ok_or(ApiError::NotFound("결제"))?;

    info!(
        "{:<12} --> 슬립 업로드: payment={} path={}",
        "Command", payment_id, image_ref
    );
    Ok(payment)
}

/// 2-2. 승인
pub async fn handle_approve(
    payment_id: i64,
    db_manager: &DatabaseManager,
    notifier: &impl Notifier,
) -> Result<Payment, ApiError> {
    let payment = sqlx::query_as::<_, Payment>(
        "UPDATE payments
         SET is_paid = true, status = $1, payment_confirmed_at = $2
         WHERE id = $3
         RETURNING *",
    )
    .bind(PAY_APPROVED)
    .bind(Utc::now())
    .bind(payment_id)
    .fetch_optional(db_manager.pool())
    .await?
    .ok_or(ApiError::NotFound("결제"))?;

    info!("{:<12} --> 결제 승인: payment={}", "Command", payment_id);
    notify_payment_best_effort(&payment, notifier).await;
    Ok(payment)
}

/// 2-3. 거절
/// is_paid 는 그대로 두어 미결제 슬롯을 유지한다(구매자는 같은 레코드로 재시도).
pub async fn handle_reject(
    payment_id: i64,
    db_manager: &DatabaseManager,
    notifier: &impl Notifier,
) -> Result<Payment, ApiError> {
    let payment = sqlx::query_as::<_, Payment>(
        "UPDATE payments SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(PAY_REJECTED)
    .bind(payment_id)
    .fetch_optional(db_manager.pool())
    .await?
    .ok_or(ApiError::NotFound("결제"))?;

    info!("{:<12} --> 결제 거절: payment={}", "Command", payment_id);
    notify_payment_best_effort(&payment, notifier).await;
    Ok(payment)
}

/// 2-4. 경매 기준 승인(판매자 측)
/// 해당 경매의 최신 결제 레코드를 승인한다.
pub async fn handle_confirm_payment_by_auction(
    auction_id: i64,
    requester_id: i64,
    requester_role: &str,
    db_manager: &DatabaseManager,
    notifier: &impl Notifier,
) -> Result<Payment, ApiError> {
    let auction = sqlx::query_as::<_, Auction>("SELECT * FROM auctions WHERE id = $1")
        .bind(auction_id)
        .fetch_optional(db_manager.pool())
        .await?
        .ok_or(ApiError::NotFound("경매"))?;

    if auction.owner_id != requester_id && requester_role != "admin" {
        return Err(ApiError::Forbidden(
            "판매자만 결제를 승인할 수 있습니다.".into(),
        ));
    }

    let payment = latest_payment_by_auction(db_manager, auction_id)
        .await?
        .ok_or(ApiError::NotFound("결제"))?;

    handle_approve(payment.id, db_manager, notifier).await
}

/// 배송 상태 전이 검증
/// shipped/delivered 만 허용하며 역방향 전이는 거절한다.
/// completed 는 구매자 수취 확인 전용이다.
pub fn validate_shipping_transition(current: &str, next: &str) -> Result<(), ApiError> {
    let new_rank = match shipping_rank(next) {
        Some(r) if next != SHIP_COMPLETED => r,
        _ => {
            return Err(ApiError::Validation(
                "배송 상태 값이 올바르지 않습니다.".into(),
            ))
        }
    };
    if new_rank <= shipping_rank(current).unwrap_or(0) {
        return Err(ApiError::Precondition(
            "배송 상태는 앞으로만 진행할 수 있습니다.".into(),
        ));
    }
    Ok(())
}

/// 3-1. 배송 상태 갱신
pub async fn handle_update_shipping_status(
    payment_id: i64,
    cmd: UpdateShippingStatusCommand,
    db_manager: &DatabaseManager,
) -> Result<Payment, ApiError> {
    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_optional(db_manager.pool())
        .await?
        .ok_or(ApiError::NotFound("결제"))?;

    validate_shipping_transition(&payment.shipping_status, &cmd.shipping_status)?;

    let updated = sqlx::query_as::<_, Payment>(
        "UPDATE payments
         SET shipping_status = $1, tracking_number = COALESCE($2, tracking_number)
         WHERE id = $3
         RETURNING *",
    )
    .bind(&cmd.shipping_status)
    .bind(&cmd.tracking_number)
    .bind(payment_id)
    .fetch_one(db_manager.pool())
    .await?;

    info!(
        "{:<12} --> 배송 상태 갱신: payment={} {} -> {}",
        "Command", payment_id, payment.shipping_status, updated.shipping_status
    );
    Ok(updated)
}

/// 3-2. 배송지 갱신
/// 슬립 업로드 이후에만 허용된다. 수취인 이름/전화는 호출 시점 프로필에서 스냅샷.
pub async fn handle_update_shipping_address(
    payment_id: i64,
    cmd: UpdateShippingAddressCommand,
    db_manager: &DatabaseManager,
) -> Result<Payment, ApiError> {
    if cmd.address.trim().is_empty() {
        return Err(ApiError::Validation("배송지 주소가 필요합니다.".into()));
    }

    let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_optional(db_manager.pool())
        .await?
        .ok_or(ApiError::NotFound("결제"))?;

    if payment.slip_image.is_none() {
        return Err(ApiError::Precondition(
            "슬립을 먼저 업로드해야 합니다.".into(),
        ));
    }

    let snapshot = buyer_snapshot(db_manager, payment.user_id).await?;

    let updated = sqlx::query_as::<_, Payment>(
        "UPDATE payments
         SET shipping_address = $1, recipient_name = $2, recipient_phone = $3, note = $4
         WHERE id = $5
         RETURNING *",
    )
    .bind(&cmd.address)
    .bind(&snapshot.name)
    .bind(&snapshot.phone)
    .bind(cmd.note.unwrap_or_default())
    .bind(payment_id)
    .fetch_one(db_manager.pool())
    .await?;

    Ok(updated)
}

/// 3-3. 수취 확인(구매자 측)
/// delivered 상태에서만 가능하며 completed 로 전이 후 시각을 기록한다.
pub async fn handle_confirm_delivery(
    auction_id: i64,
    requester_id: i64,
    db_manager: &DatabaseManager,
) -> Result<Payment, ApiError> {
    let payment = latest_payment_by_auction(db_manager, auction_id)
        .await?
        .ok_or(ApiError::NotFound("결제"))?;

    if payment.user_id != requester_id {
        return Err(ApiError::Forbidden(
            "구매자만 수취를 확인할 수 있습니다.".into(),
        ));
    }

    if payment.shipping_status != SHIP_DELIVERED {
        return Err(ApiError::Precondition(
            "delivered 상태에서만 수취 확인이 가능합니다.".into(),
        ));
    }

    let updated = sqlx::query_as::<_, Payment>(
        "UPDATE payments
         SET shipping_status = $1, status = $2, delivery_confirmed_at = $3
         WHERE id = $4
         RETURNING *",
    )
    .bind(SHIP_COMPLETED)
    .bind(PAY_COMPLETED)
    .bind(Utc::now())
    .bind(payment.id)
    .fetch_one(db_manager.pool())
    .await?;

    info!(
        "{:<12} --> 수취 확인 완료: payment={}",
        "Command", payment.id
    );
    Ok(updated)
}

/// 경매 기준 최신 결제 레코드 조회
pub async fn latest_payment_by_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Payment>, ApiError> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments
         WHERE auction_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(auction_id)
    .fetch_optional(db_manager.pool())
    .await?;
    Ok(payment)
}

/// 결제 상태 통보 (best-effort)
async fn notify_payment_best_effort(payment: &Payment, notifier: &impl Notifier) {
    if let Err(e) = notifier.notify_payment(payment).await {
        warn!(
            "{:<12} --> 결제 상태 통보 실패(무시): payment={} err={}",
            "Command", payment.id, e
        );
    }
}

// endregion: --- Commands

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::model::{SHIP_NOT_SENT, SHIP_SHIPPED};

    #[test]
    fn forward_transitions_allowed() {
        assert!(validate_shipping_transition(SHIP_NOT_SENT, SHIP_SHIPPED).is_ok());
        assert!(validate_shipping_transition(SHIP_NOT_SENT, SHIP_DELIVERED).is_ok());
        assert!(validate_shipping_transition(SHIP_SHIPPED, SHIP_DELIVERED).is_ok());
    }

    #[test]
    fn backward_and_repeat_transitions_rejected() {
        assert!(matches!(
            validate_shipping_transition(SHIP_DELIVERED, SHIP_SHIPPED),
            Err(ApiError::Precondition(_))
        ));
        assert!(matches!(
            validate_shipping_transition(SHIP_SHIPPED, SHIP_SHIPPED),
            Err(ApiError::Precondition(_))
        ));
    }

    #[test]
    fn completed_not_reachable_from_status_update() {
        // completed 는 수취 확인 전용
        assert!(matches!(
            validate_shipping_transition(SHIP_DELIVERED, SHIP_COMPLETED),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn unknown_status_rejected() {
        assert!(matches!(
            validate_shipping_transition(SHIP_NOT_SENT, "returned"),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_shipping_transition(SHIP_NOT_SENT, ""),
            Err(ApiError::Validation(_))
        ));
    }
}
// endregion: --- Tests
