use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use sqlx::PgPool;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{BillStatus, Payment, PaymentStatus, VerificationStatus};
use crate::repository::{bills, map_db_error, payments};

type HmacSha512 = Hmac<Sha512>;

const CHARGE_SUCCESS_EVENT: &str = "charge.success";

#[derive(Debug, Deserialize)]
struct GatewayEvent {
    event: String,
    data: GatewayEventData,
}

#[derive(Debug, Deserialize)]
struct GatewayEventData {
    reference: String,
}

#[derive(Debug)]
pub enum WebhookOutcome {
    /// The payment was confirmed and its bill marked PAID.
    Applied(Box<Payment>),
    /// A replay of an already-confirmed reference. Nothing changed.
    AlreadyApplied,
    /// An event type this service does not act on.
    Ignored,
}

/// Check the gateway's HMAC-SHA512 hex signature over the raw request body.
pub fn verify_webhook_signature(payload: &[u8], signature_hex: &str, secret: &str) -> bool {
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);

    let Ok(expected_bytes) = hex_decode(signature_hex.trim()) else {
        return false;
    };
    mac.verify_slice(&expected_bytes).is_ok()
}

/// Decode a hex string into bytes.
fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

/// Whether a charge confirmation may still act on a payment in the given
/// review state. Approved replays short-circuit to a no-op; a declined
/// payment is final and the confirmation is rejected rather than letting the
/// gateway overturn a manual review.
fn confirmation_guard(current: VerificationStatus) -> AppResult<Option<WebhookOutcome>> {
    match current {
        VerificationStatus::Pending => Ok(None),
        VerificationStatus::Approved => Ok(Some(WebhookOutcome::AlreadyApplied)),
        VerificationStatus::Declined => Err(AppError::Conflict(
            "Payment was declined by review.".to_string(),
        )),
    }
}

/// Apply a verified gateway webhook. Only `charge.success` events act;
/// replays of a confirmed reference are no-ops.
pub async fn apply_webhook(pool: &PgPool, payload: &[u8]) -> AppResult<WebhookOutcome> {
    let event: GatewayEvent = serde_json::from_slice(payload)
        .map_err(|_| AppError::UnprocessableEntity("Malformed webhook payload.".to_string()))?;

    if event.event != CHARGE_SUCCESS_EVENT {
        info!(event = %event.event, "Ignoring gateway event");
        return Ok(WebhookOutcome::Ignored);
    }

    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let payment = payments::find_by_reference_tx(&mut tx, &event.data.reference)
        .await?
        .ok_or_else(|| AppError::NotFound("Unknown payment reference.".to_string()))?;

    if let Some(outcome) = confirmation_guard(payment.verification_status)? {
        info!(reference = %event.data.reference, "Webhook replay ignored");
        return Ok(outcome);
    }

    let payment = payments::set_review_tx(
        &mut tx,
        payment.id,
        PaymentStatus::Completed,
        VerificationStatus::Approved,
    )
    .await?;
    if let Some(bill_id) = payment.bill_id {
        bills::set_status_tx(&mut tx, bill_id, BillStatus::Paid).await?;
    }

    tx.commit().await.map_err(map_db_error)?;

    info!(
        payment_id = %payment.id,
        reference = %payment.reference,
        "Gateway charge confirmed"
    );
    Ok(WebhookOutcome::Applied(Box::new(payment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).expect("key");
        mac.update(payload);
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    #[test]
    fn accepts_a_valid_signature() {
        let payload = br#"{"event":"charge.success","data":{"reference":"PAY-1"}}"#;
        let signature = sign(payload, "whsec_test");
        assert!(verify_webhook_signature(payload, &signature, "whsec_test"));
    }

    #[test]
    fn rejects_wrong_secret_and_tampered_body() {
        let payload = br#"{"event":"charge.success","data":{"reference":"PAY-1"}}"#;
        let signature = sign(payload, "whsec_test");
        assert!(!verify_webhook_signature(payload, &signature, "whsec_other"));
        assert!(!verify_webhook_signature(b"tampered", &signature, "whsec_test"));
    }

    #[test]
    fn rejects_non_hex_signatures() {
        assert!(!verify_webhook_signature(b"x", "zz-not-hex", "whsec_test"));
        assert!(!verify_webhook_signature(b"x", "abc", "whsec_test"));
    }

    #[test]
    fn confirmation_respects_prior_review() {
        assert!(matches!(
            confirmation_guard(VerificationStatus::Pending),
            Ok(None)
        ));
        assert!(matches!(
            confirmation_guard(VerificationStatus::Approved),
            Ok(Some(WebhookOutcome::AlreadyApplied))
        ));
        assert!(matches!(
            confirmation_guard(VerificationStatus::Declined),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn decodes_hex() {
        assert_eq!(hex_decode("00ff10"), Ok(vec![0x00, 0xff, 0x10]));
        assert!(hex_decode("0g").is_err());
        assert!(hex_decode("abc").is_err());
    }
}
