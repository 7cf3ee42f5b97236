// region:    --- Imports
use crate::auction::commands::{
    self as auction_commands, CreateAuctionCommand, PlaceBidCommand,
};
use crate::blob_store::BlobStore;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::notification::KafkaNotifier;
use crate::payment::commands::{
    self as payment_commands, GenerateQrCommand, UpdateShippingAddressCommand,
    UpdateShippingStatusCommand,
};
use crate::query;
use crate::session::{AdminUser, AuthUser, SessionStore};
use axum::extract::{FromRef, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- App State
#[derive(Clone)]
pub struct AppState {
    pub db_manager: Arc<DatabaseManager>,
    pub notifier: Arc<KafkaNotifier>,
    pub sessions: Arc<dyn SessionStore>,
    pub blob_store: Arc<dyn BlobStore>,
}

impl FromRef<AppState> for Arc<dyn SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.sessions)
    }
}

/// 라우터 구성
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/auctions",
            post(handle_create_auction).get(handle_get_auctions),
        )
        .route("/auctions/:id", get(handle_get_auction))
        .route(
            "/auctions/:id/bids",
            post(handle_place_bid).get(handle_get_bid_history),
        )
        .route("/auctions/:id/highest-bid", get(handle_get_highest_bid))
        .route("/payments/generate-qr", post(handle_generate_qr))
        .route("/payments/upload-slip/:payment_id", post(handle_upload_slip))
        .route("/payments/payment-status/:id", get(handle_get_payment_status))
        .route(
            "/payments/slip-by-auction/:auction_id",
            get(handle_get_slip_by_auction),
        )
        .route(
            "/payments/confirm-payment/by-auction/:auction_id",
            post(handle_confirm_payment_by_auction),
        )
        .route(
            "/payments/shipping-status/:payment_id",
            post(handle_update_shipping_status),
        )
        .route(
            "/payments/shipping-address/:payment_id",
            post(handle_update_shipping_address),
        )
        .route(
            "/payments/confirm-delivery/:auction_id",
            patch(handle_confirm_delivery),
        )
        .route("/payments/my", get(handle_get_my_payments))
        .route(
            "/admin/auctions/:id/force-end",
            post(handle_force_end_auction),
        )
        .route("/admin/auctions/force-end-all", post(handle_force_end_all))
        .route("/admin/payments/pending", get(handle_get_pending_payments))
        .route("/admin/payments/paid", get(handle_get_paid_payments))
        .route("/admin/payments/:id/approve", post(handle_approve_payment))
        .route("/admin/payments/:id/reject", post(handle_reject_payment))
        .route("/admin/payments/:id", get(handle_admin_get_payment))
        .with_state(state)
}
// endregion: --- App State

// region:    --- Auction Handlers

/// 경매 생성
pub async fn handle_create_auction(
    State(state): State<AppState>,
    user: AuthUser,
    Json(cmd): Json<CreateAuctionCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let auction =
        auction_commands::handle_create_auction(cmd, user.user_id, &state.db_manager).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": auction })),
    ))
}

/// 경매 목록 조회
pub async fn handle_get_auctions(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let auctions = query::handlers::get_all_auctions(&state.db_manager).await?;
    Ok(Json(json!({ "status": "success", "data": auctions })))
}

/// 경매 조회(입찰 목록 포함)
pub async fn handle_get_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let auction = query::handlers::get_auction(&state.db_manager, auction_id)
        .await?
        .ok_or(ApiError::NotFound("경매"))?;
    let bids = query::handlers::get_bid_history(&state.db_manager, auction_id).await?;
    Ok(Json(json!({
        "status": "success",
        "data": { "auction": auction, "bids": bids }
    })))
}

/// 입찰 이력 조회
pub async fn handle_get_bid_history(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let bids = query::handlers::get_bid_history(&state.db_manager, auction_id).await?;
    Ok(Json(json!({ "status": "success", "data": bids })))
}

/// 최고 입찰가 조회
pub async fn handle_get_highest_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let highest = query::handlers::get_highest_bid(&state.db_manager, auction_id).await?;
    Ok(Json(json!({ "status": "success", "data": { "highestBid": highest } })))
}

/// 입찰
pub async fn handle_place_bid(
    State(state): State<AppState>,
    user: AuthUser,
    Path(auction_id): Path<i64>,
    Json(cmd): Json<PlaceBidCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let (auction, bid) =
        auction_commands::handle_place_bid(auction_id, user.user_id, cmd, &state.db_manager)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": { "auction": auction, "bid": bid }
        })),
    ))
}

// endregion: --- Auction Handlers

// region:    --- Payment Handlers

/// 결제 QR 생성(멱등)
pub async fn handle_generate_qr(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(cmd): Json<GenerateQrCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = payment_commands::handle_generate_qr(cmd, &state.db_manager).await?;
    Ok(Json(json!({
        "success": true,
        "qrCode": payment.qr_payload,
        "paymentId": payment.id
    })))
}

/// 슬립 업로드 (multipart 필드명: slip)
pub async fn handle_upload_slip(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(payment_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut saved: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("업로드 형식 오류: {}", e)))?
    {
        if field.name() != Some("slip") {
            continue;
        }
        let extension = field
            .file_name()
            .and_then(|n| n.rsplit('.').next())
            .unwrap_or("jpg")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("업로드 읽기 오류: {}", e)))?;
        let path = state
            .blob_store
            .save(&bytes, &extension)
            .await
            .map_err(ApiError::Internal)?;
        saved = Some(path);
        break;
    }

    let image_ref = saved.ok_or_else(|| ApiError::Validation("슬립 파일이 필요합니다.".into()))?;
    let payment =
        payment_commands::handle_upload_slip(payment_id, &image_ref, &state.db_manager).await?;

    Ok(Json(json!({ "success": true, "slipImage": payment.slip_image })))
}

/// 결제 상태 조회
pub async fn handle_get_payment_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(payment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = query::handlers::get_payment(&state.db_manager, payment_id)
        .await?
        .ok_or(ApiError::NotFound("결제"))?;
    Ok(Json(json!({
        "success": true,
        "slipImage": payment.slip_image,
        "isPaid": payment.is_paid,
        "status": payment.status,
        "shippingStatus": payment.shipping_status,
        "trackingNumber": payment.tracking_number,
    })))
}

/// 경매 기준 결제/슬립 조회
pub async fn handle_get_slip_by_auction(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = query::handlers::get_latest_payment_by_auction(&state.db_manager, auction_id)
        .await?
        .ok_or(ApiError::NotFound("결제"))?;
    Ok(Json(json!({
        "success": true,
        "paymentId": payment.id,
        "slipImage": payment.slip_image,
        "isPaid": payment.is_paid,
        "status": payment.status,
        "shippingStatus": payment.shipping_status,
        "trackingNumber": payment.tracking_number,
        "note": payment.note,
        "recipientName": payment.recipient_name,
        "recipientPhone": payment.recipient_phone,
        "shippingAddress": payment.shipping_address,
    })))
}

/// 경매 기준 결제 승인(판매자 측)
pub async fn handle_confirm_payment_by_auction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    payment_commands::handle_confirm_payment_by_auction(
        auction_id,
        user.user_id,
        &user.role,
        &state.db_manager,
        &*state.notifier,
    )
    .await?;
    Ok(Json(json!({ "success": true, "message": "결제가 승인되었습니다." })))
}

/// 배송 상태 갱신
pub async fn handle_update_shipping_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(payment_id): Path<i64>,
    Json(cmd): Json<UpdateShippingStatusCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let payment =
        payment_commands::handle_update_shipping_status(payment_id, cmd, &state.db_manager)
            .await?;
    Ok(Json(json!({
        "success": true,
        "shippingStatus": payment.shipping_status,
        "trackingNumber": payment.tracking_number,
    })))
}

/// 배송지 갱신(슬립 업로드 이후)
pub async fn handle_update_shipping_address(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(payment_id): Path<i64>,
    Json(cmd): Json<UpdateShippingAddressCommand>,
) -> Result<impl IntoResponse, ApiError> {
    let payment =
        payment_commands::handle_update_shipping_address(payment_id, cmd, &state.db_manager)
            .await?;
    Ok(Json(json!({
        "success": true,
        "shippingAddress": payment.shipping_address,
        "recipientName": payment.recipient_name,
        "recipientPhone": payment.recipient_phone,
    })))
}

/// 수취 확인(구매자 측)
pub async fn handle_confirm_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let payment =
        payment_commands::handle_confirm_delivery(auction_id, user.user_id, &state.db_manager)
            .await?;
    Ok(Json(json!({
        "success": true,
        "shippingStatus": payment.shipping_status,
        "deliveryConfirmedAt": payment.delivery_confirmed_at,
    })))
}

/// 내 결제 이력 조회
pub async fn handle_get_my_payments(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let payments = query::handlers::get_my_payments(&state.db_manager, user.user_id).await?;
    Ok(Json(json!({ "success": true, "payments": payments })))
}

// endregion: --- Payment Handlers

// region:    --- Admin Handlers

/// 경매 강제 종료(단건)
pub async fn handle_force_end_auction(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(auction_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        "{:<12} --> 강제 종료 요청: auction={} admin={}",
        "Admin", auction_id, admin.0.user_id
    );
    let auction =
        auction_commands::force_end_auction(auction_id, &state.db_manager, &*state.notifier)
            .await?;
    Ok(Json(json!({ "status": "success", "data": auction })))
}

/// 경매 강제 종료(전체 활성 건)
pub async fn handle_force_end_all(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        "{:<12} --> 전체 강제 종료 요청: admin={}",
        "Admin", admin.0.user_id
    );
    let auctions =
        auction_commands::force_end_all_active(&state.db_manager, &*state.notifier).await?;
    Ok(Json(json!({ "status": "success", "count": auctions.len(), "data": auctions })))
}

/// 심사 대기 결제 목록
pub async fn handle_get_pending_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let payments = query::handlers::get_pending_payments(&state.db_manager).await?;
    Ok(Json(json!({ "success": true, "payments": payments })))
}

/// 결제 승인
pub async fn handle_approve_payment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(payment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let payment =
        payment_commands::handle_approve(payment_id, &state.db_manager, &*state.notifier).await?;
    Ok(Json(json!({ "success": true, "status": payment.status })))
}

/// 결제 거절
pub async fn handle_reject_payment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(payment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let payment =
        payment_commands::handle_reject(payment_id, &state.db_manager, &*state.notifier).await?;
    Ok(Json(json!({ "success": true, "status": payment.status })))
}

/// 기간 내 결제 완료 건 조회
#[derive(Debug, Deserialize)]
pub struct PaidRangeQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn handle_get_paid_payments(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(range): Query<PaidRangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let payments =
        query::handlers::get_paid_payments_by_range(&state.db_manager, range.start, range.end)
            .await?;
    Ok(Json(json!({
        "success": true,
        "count": payments.len(),
        "payments": payments
    })))
}

/// 결제 상세 조회
pub async fn handle_admin_get_payment(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(payment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = query::handlers::get_payment(&state.db_manager, payment_id)
        .await?
        .ok_or(ApiError::NotFound("결제"))?;
    Ok(Json(json!({ "success": true, "payment": payment })))
}

// endregion: --- Admin Handlers
