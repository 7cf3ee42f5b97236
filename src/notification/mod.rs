/// 알림 디스패처
/// 낙찰 통보와 결제 상태 변경을 notifications 토픽으로 발행한다.
/// 실제 전달(이메일/푸시)은 토픽을 구독하는 외부 서비스 몫이며,
/// 발행 실패는 호출 측에서 로그만 남긴다. 상태 전이는 이미 커밋된 뒤다.
// region:    --- Imports
use crate::message_broker::KafkaProducer;
use crate::payment::model::Payment;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Notifier Trait
/// 알림 디스패처 트레이트
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 낙찰자 통보
    async fn notify_winner(
        &self,
        contact: &str,
        auction_name: &str,
        final_price: i64,
    ) -> Result<(), String>;

    /// 결제 상태 변경 통보
    async fn notify_payment(&self, payment: &Payment) -> Result<(), String>;
}
// endregion: --- Notifier Trait

// region:    --- Kafka Notifier
/// 알림 토픽 이름
pub const NOTIFICATIONS_TOPIC: &str = "notifications";

/// Kafka 기반 구현체
pub struct KafkaNotifier {
    producer: Arc<KafkaProducer>,
}

impl KafkaNotifier {
    pub fn new(producer: Arc<KafkaProducer>) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn notify_winner(
        &self,
        contact: &str,
        auction_name: &str,
        final_price: i64,
    ) -> Result<(), String> {
        info!(
            "{:<12} --> 낙찰 통보 발행: {} ({}원)",
            "Notifier", auction_name, final_price
        );
        let event = serde_json::json!({
            "type": "AuctionWon",
            "contact": contact,
            "auction_name": auction_name,
            "final_price": final_price,
            "timestamp": Utc::now(),
        });
        self.producer
            .send_message(NOTIFICATIONS_TOPIC, contact, &event.to_string())
            .await
    }

    async fn notify_payment(&self, payment: &Payment) -> Result<(), String> {
        info!(
            "{:<12} --> 결제 상태 통보 발행: payment={} status={}",
            "Notifier", payment.id, payment.status
        );
        let event = serde_json::json!({
            "type": "PaymentStatusChanged",
            "payment_id": payment.id,
            "auction_id": payment.auction_id,
            "user_id": payment.user_id,
            "status": payment.status,
            "is_paid": payment.is_paid,
            "timestamp": Utc::now(),
        });
        self.producer
            .send_message(NOTIFICATIONS_TOPIC, &payment.id.to_string(), &event.to_string())
            .await
    }
}
// endregion: --- Kafka Notifier

// region:    --- Test Support
/// 테스트용 무발행 구현체
#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    pub winners: std::sync::Mutex<Vec<(String, String, i64)>>,
    pub payments: std::sync::Mutex<Vec<(i64, String)>>,
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_winner(
        &self,
        contact: &str,
        auction_name: &str,
        final_price: i64,
    ) -> Result<(), String> {
        self.winners
            .lock()
            .unwrap()
            .push((contact.to_string(), auction_name.to_string(), final_price));
        Ok(())
    }

    async fn notify_payment(&self, payment: &Payment) -> Result<(), String> {
        self.payments
            .lock()
            .unwrap()
            .push((payment.id, payment.status.clone()));
        Ok(())
    }
}
// endregion: --- Test Support

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn recording_notifier_captures_winner_events() {
        let notifier = RecordingNotifier::default();
        notifier
            .notify_winner("buyer@test.example", "레고 밀레니엄 팔콘", 4250)
            .await
            .unwrap();

        let winners = notifier.winners.lock().unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(
            winners[0],
            (
                "buyer@test.example".to_string(),
                "레고 밀레니엄 팔콘".to_string(),
                4250
            )
        );
    }

    #[tokio::test]
    async fn recording_notifier_captures_payment_events() {
        let notifier = RecordingNotifier::default();
        let payment = Payment {
            id: 9,
            auction_id: 1,
            user_id: 2,
            amount: 4250,
            qr_payload: "000201".to_string(),
            slip_image: None,
            status: "approved".to_string(),
            shipping_status: "not_sent".to_string(),
            tracking_number: None,
            shipping_address: None,
            recipient_name: String::new(),
            recipient_phone: String::new(),
            note: String::new(),
            is_paid: true,
            payment_confirmed_at: Some(Utc::now()),
            delivery_confirmed_at: None,
            expires_at: Utc::now() + Duration::minutes(15),
            created_at: Utc::now(),
        };
        notifier.notify_payment(&payment).await.unwrap();

        let payments = notifier.payments.lock().unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0], (9, "approved".to_string()));
    }
}
// endregion: --- Tests
