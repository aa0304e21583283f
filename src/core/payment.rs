use crate::models::{format_cents, MatchResult, PaymentSession, Pricing};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime of a payment session
pub const PAYMENT_WINDOW_MINUTES: i64 = 15;

const PIX_GUI: &str = "BR.GOV.BCB.PIX";
const PIX_KEY_LEN: usize = 32;
const MAX_MERCHANT_NAME: usize = 25;
const MAX_MERCHANT_CITY: usize = 15;

static ORDER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub fn payment_window() -> Duration {
    Duration::minutes(PAYMENT_WINDOW_MINUTES)
}

/// Issues mock PIX checkouts. Nothing is transmitted anywhere.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    pricing: Pricing,
    merchant_name: String,
    merchant_city: String,
}

impl SessionBuilder {
    pub fn new(pricing: Pricing, merchant_name: &str, merchant_city: &str) -> Self {
        Self {
            pricing,
            merchant_name: emv_text(merchant_name, MAX_MERCHANT_NAME),
            merchant_city: emv_text(merchant_city, MAX_MERCHANT_CITY),
        }
    }

    pub fn pricing(&self) -> Pricing {
        self.pricing
    }

    /// Build the payment session for a chosen match
    pub fn build_session<R: Rng + ?Sized>(
        &self,
        selected: &MatchResult,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> PaymentSession {
        let amount_cents = self.pricing.total_cents();
        let order_id = next_order_id(now);
        let key: String = (0..PIX_KEY_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
            .collect();

        let code = self.pix_payload(&key, amount_cents, &order_id);

        PaymentSession {
            code,
            amount_cents,
            order_id,
            match_id: selected.id().to_string(),
            created_at: now,
            expires_at: now + payment_window(),
        }
    }

    fn pix_payload(&self, key: &str, amount_cents: u64, order_id: &str) -> String {
        let account = format!("{}{}", tlv("00", PIX_GUI), tlv("01", key));
        let additional = tlv("05", order_id);

        let mut payload = String::with_capacity(160);
        payload.push_str(&tlv("00", "01"));
        payload.push_str(&tlv("26", &account));
        payload.push_str(&tlv("52", "0000"));
        payload.push_str(&tlv("53", "986"));
        payload.push_str(&tlv("54", &format_cents(amount_cents)));
        payload.push_str(&tlv("58", "BR"));
        payload.push_str(&tlv("59", &self.merchant_name));
        payload.push_str(&tlv("60", &self.merchant_city));
        payload.push_str(&tlv("62", &additional));

        // The checksum covers its own id and length
        payload.push_str("6304");
        let crc = crc16_ccitt(payload.as_bytes());
        payload.push_str(&format!("{:04X}", crc));
        payload
    }
}

fn next_order_id(now: DateTime<Utc>) -> String {
    let seq = ORDER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("FM{}{:04}", now.timestamp_millis(), seq)
}

fn tlv(id: &str, value: &str) -> String {
    format!("{}{:02}{}", id, value.len(), value)
}

/// Uppercase ASCII text capped at `max` characters. Accented Latin letters
/// keep their base letter.
fn emv_text(raw: &str, max: usize) -> String {
    raw.chars()
        .map(ascii_base)
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .map(|c| c.to_ascii_uppercase())
        .take(max)
        .collect()
}

fn ascii_base(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' | 'Ç' => 'C',
        'ñ' | 'Ñ' => 'N',
        other => other,
    }
}

/// CRC16/CCITT-FALSE as used by EMV QR payloads
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}
