/// 프롬프트페이 QR 페이로드 생성 (EMVCo TLV)
/// 수취 식별자(휴대폰/주민번호/e-wallet)와 금액을 TLV 로 직렬화하고
/// CRC-16/CCITT-FALSE 체크섬 필드(6304)로 마무리한다.
// region:    --- Constants
const ID_PAYLOAD_FORMAT: &str = "00";
const ID_POI_METHOD: &str = "01";
const ID_MERCHANT_INFO: &str = "29";
const ID_COUNTRY_CODE: &str = "58";
const ID_CURRENCY: &str = "53";
const ID_AMOUNT: &str = "54";
const ID_CRC: &str = "63";

const PAYLOAD_FORMAT_EMV: &str = "01";
// 금액이 고정된 QR 은 dynamic(12), 아니면 static(11)
const POI_STATIC: &str = "11";
const POI_DYNAMIC: &str = "12";

const PROMPTPAY_AID: &str = "A000000677010111";
const SUB_MOBILE: &str = "01";
const SUB_NATIONAL_ID: &str = "02";
const SUB_EWALLET: &str = "03";

const COUNTRY_TH: &str = "TH";
const CURRENCY_THB: &str = "764";
// endregion: --- Constants

// region:    --- Payload
/// TLV 필드 직렬화: ID + 2자리 길이 + 값
fn field(id: &str, value: &str) -> String {
    format!("{}{:02}{}", id, value.len(), value)
}

/// 숫자 이외 문자 제거
fn sanitize_target(target: &str) -> String {
    target.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 휴대폰 번호는 선행 0 을 국가번호 66 으로 치환 후 13자리로 0 패딩
fn format_target(digits: &str) -> String {
    if digits.len() >= 13 {
        return digits.to_string();
    }
    let replaced = match digits.strip_prefix('0') {
        Some(rest) => format!("66{}", rest),
        None => digits.to_string(),
    };
    format!("{:0>13}", replaced)
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF)
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in data {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// 프롬프트페이 페이로드 생성
/// target 이 숫자를 포함하지 않으면 None.
/// amount 는 바트 단위 정수이며 지정 시 dynamic QR 이 된다.
pub fn generate_payload(target: &str, amount: Option<i64>) -> Option<String> {
    let digits = sanitize_target(target);
    if digits.is_empty() {
        return None;
    }

    let sub_id = if digits.len() >= 15 {
        SUB_EWALLET
    } else if digits.len() >= 13 {
        SUB_NATIONAL_ID
    } else {
        SUB_MOBILE
    };

    let merchant_info = format!(
        "{}{}",
        field("00", PROMPTPAY_AID),
        field(sub_id, &format_target(&digits))
    );

    let mut payload = String::new();
    payload.push_str(&field(ID_PAYLOAD_FORMAT, PAYLOAD_FORMAT_EMV));
    payload.push_str(&field(
        ID_POI_METHOD,
        if amount.is_some() { POI_DYNAMIC } else { POI_STATIC },
    ));
    payload.push_str(&field(ID_MERCHANT_INFO, &merchant_info));
    payload.push_str(&field(ID_COUNTRY_CODE, COUNTRY_TH));
    payload.push_str(&field(ID_CURRENCY, CURRENCY_THB));
    if let Some(amount) = amount {
        payload.push_str(&field(ID_AMOUNT, &format!("{}.00", amount)));
    }

    // 체크섬은 "6304" 까지 포함해 계산
    payload.push_str(ID_CRC);
    payload.push_str("04");
    let crc = crc16(payload.as_bytes());
    payload.push_str(&format!("{:04X}", crc));

    Some(payload)
}
// endregion: --- Payload

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_mobile_payload() {
        // promptpay-qr 레퍼런스 구현과 동일한 출력
        assert_eq!(
            generate_payload("0899999999", None).unwrap(),
            "00020101021129370016A000000677010111011300668999999995802TH53037646304FE29"
        );
    }

    #[test]
    fn dynamic_mobile_payload_with_amount() {
        assert_eq!(
            generate_payload("081-234-5678", Some(4250)).unwrap(),
            "00020101021229370016A000000677010111011300668123456785802TH530376454074250.0063048B58"
        );
    }

    #[test]
    fn national_id_payload() {
        assert_eq!(
            generate_payload("1234567890123", Some(100)).unwrap(),
            "00020101021229370016A000000677010111021312345678901235802TH53037645406100.006304BB6C"
        );
    }

    #[test]
    fn one_baht_payload() {
        assert_eq!(
            generate_payload("0899999999", Some(1)).unwrap(),
            "00020101021229370016A000000677010111011300668999999995802TH530376454041.0063041A88"
        );
    }

    #[test]
    fn target_without_digits_is_rejected() {
        assert_eq!(generate_payload("abc", Some(100)), None);
        assert_eq!(generate_payload("", None), None);
    }

    #[test]
    fn phone_target_is_normalized() {
        assert_eq!(format_target("0899999999"), "0066899999999");
        assert_eq!(format_target("1234567890123"), "1234567890123");
    }
}
// endregion: --- Tests
