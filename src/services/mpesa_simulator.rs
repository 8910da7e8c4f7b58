// services/mpesa_simulator.rs
//
// Simulated M-Pesa STK push cycle: an accepted request row is written
// immediately, then after the configured delay the "callback" settles the
// transaction to one of four outcomes. The settlement write is a
// compare-and-swap on the absent result fields, so a transaction can never
// be settled twice even with concurrent resolvers.
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mongodb::bson::{doc, oid::ObjectId, Bson};
use mongodb::{Collection, Database};

use crate::errors::{AppError, Result};
use crate::models::mpesa::MpesaTransaction;
use crate::models::sale::TransactionStatus;
use crate::models::settings::{
    Setting, MPESA_PASSKEY, MPESA_SIMULATION_DELAY_SECS, MPESA_TILL_NUMBER,
};

const DEFAULT_SIMULATION_DELAY_SECS: u64 = 5;

/// The four mutually exclusive ways a simulated payment attempt can land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Success,
    InsufficientFunds,
    Cancelled,
    OtherError,
}

impl SettlementOutcome {
    pub fn result_code(&self) -> &'static str {
        match self {
            SettlementOutcome::Success => "0",
            SettlementOutcome::InsufficientFunds => "1001",
            SettlementOutcome::Cancelled => "1032",
            SettlementOutcome::OtherError => "1000",
        }
    }

    pub fn result_description(&self) -> &'static str {
        match self {
            SettlementOutcome::Success => "The transaction was successful.",
            SettlementOutcome::InsufficientFunds => {
                "The customer has insufficient funds in Mpesa account."
            }
            SettlementOutcome::Cancelled => "Failed cancelled by customer.",
            SettlementOutcome::OtherError => "An error occurred during the transaction.",
        }
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        match self {
            SettlementOutcome::Success => TransactionStatus::Success,
            _ => TransactionStatus::Failed,
        }
    }

    pub fn from_result_code(code: &str) -> Option<SettlementOutcome> {
        match code {
            "0" => Some(SettlementOutcome::Success),
            "1001" => Some(SettlementOutcome::InsufficientFunds),
            "1032" => Some(SettlementOutcome::Cancelled),
            "1000" => Some(SettlementOutcome::OtherError),
            _ => None,
        }
    }
}

/// Where outcomes and receipt serials come from. Production wires in
/// [`RandomOutcomeSource`]; tests inject fixed sources to pin the draw.
pub trait OutcomeSource: Send + Sync {
    fn draw_outcome(&self) -> SettlementOutcome;
    /// Six-digit serial for a receipt number.
    fn receipt_serial(&self) -> u32;
}

/// Equal-probability draw over the four outcomes.
pub struct RandomOutcomeSource;

impl OutcomeSource for RandomOutcomeSource {
    fn draw_outcome(&self) -> SettlementOutcome {
        let mut rng = rand::thread_rng();
        match rng.gen_range(0..4) {
            0 => SettlementOutcome::Success,
            1 => SettlementOutcome::InsufficientFunds,
            2 => SettlementOutcome::Cancelled,
            _ => SettlementOutcome::OtherError,
        }
    }

    fn receipt_serial(&self) -> u32 {
        let mut rng = rand::thread_rng();
        rng.gen_range(100_000..1_000_000)
    }
}

/// A settled (or replayed) payment attempt.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub status: TransactionStatus,
    pub result_code: String,
    pub result_description: String,
    pub mpesa_receipt_number: Option<String>,
}

pub fn settle(outcome: SettlementOutcome, source: &dyn OutcomeSource) -> Settlement {
    let mpesa_receipt_number = match outcome {
        SettlementOutcome::Success => Some(format!("NF{}", source.receipt_serial())),
        _ => None,
    };
    Settlement {
        status: outcome.transaction_status(),
        result_code: outcome.result_code().to_string(),
        result_description: outcome.result_description().to_string(),
        mpesa_receipt_number,
    }
}

pub struct MpesaSimulator {
    db: Database,
    outcomes: Arc<dyn OutcomeSource>,
}

impl MpesaSimulator {
    pub fn new(db: Database, outcomes: Arc<dyn OutcomeSource>) -> Self {
        MpesaSimulator { db, outcomes }
    }

    fn transactions(&self) -> Collection<MpesaTransaction> {
        self.db.collection("mpesa_transactions")
    }

    async fn setting(&self, key: &str) -> Result<Option<String>> {
        let settings: Collection<Setting> = self.db.collection("settings");
        let row = settings.find_one(doc! { "_id": key }).await?;
        Ok(row.map(|s| s.setting_value))
    }

    async fn simulation_delay(&self) -> Result<Duration> {
        let secs = match self.setting(MPESA_SIMULATION_DELAY_SECS).await? {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                warn!("Unparseable {} setting: {:?}", MPESA_SIMULATION_DELAY_SECS, raw);
                DEFAULT_SIMULATION_DELAY_SECS
            }),
            None => DEFAULT_SIMULATION_DELAY_SECS,
        };
        Ok(Duration::from_secs(secs))
    }

    /// Record the STK push request and return the new transaction id.
    ///
    /// Correlation identifiers are freshly generated; the result fields stay
    /// absent until [`resolve`](Self::resolve) settles the transaction.
    pub async fn initiate(&self, mobile_no: &str, amount: f64) -> Result<ObjectId> {
        if !(amount > 0.0) {
            return Err(AppError::validation("Amount must be greater than 0."));
        }

        let till = self
            .setting(MPESA_TILL_NUMBER)
            .await?
            .ok_or_else(|| AppError::internal("M-Pesa till number is not configured"))?;
        let passkey = self
            .setting(MPESA_PASSKEY)
            .await?
            .ok_or_else(|| AppError::internal("M-Pesa passkey is not configured"))?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = generate_password(&till, &passkey, &timestamp);
        let formatted_phone = format_phone_number(mobile_no);
        debug!(
            "Simulated STK request: shortcode={} phone={} password={}",
            till, formatted_phone, password
        );

        let transaction_id = ObjectId::new();
        let transaction = MpesaTransaction {
            _id: Some(transaction_id),
            sale_id: None,
            mobile_no: mobile_no.to_string(),
            amount,
            request_time: Utc::now(),
            checkout_request_id: Uuid::new_v4().to_string(),
            merchant_request_id: Uuid::new_v4().to_string(),
            response_code: "0".to_string(),
            response_description: "Success. Request accepted for processing.".to_string(),
            result_code: None,
            result_description: None,
            mpesa_receipt_number: None,
        };

        self.transactions().insert_one(&transaction).await?;
        info!(
            "STK push accepted: txn={} merchant_request_id={}",
            transaction_id.to_hex(),
            transaction.merchant_request_id
        );
        Ok(transaction_id)
    }

    /// Settle the transaction after the configured delay.
    ///
    /// The sleep holds no store lock; other pumps and shifts stay fully
    /// operable while a resolution is in flight. Calling this twice for the
    /// same transaction replays the stored outcome instead of drawing again.
    pub async fn resolve(&self, transaction_id: ObjectId) -> Result<Settlement> {
        let delay = self.simulation_delay().await?;
        tokio::time::sleep(delay).await;

        let outcome = self.outcomes.draw_outcome();
        let settlement = settle(outcome, self.outcomes.as_ref());

        let receipt_bson = match &settlement.mpesa_receipt_number {
            Some(receipt) => Bson::String(receipt.clone()),
            None => Bson::Null,
        };
        let updated = self
            .transactions()
            .find_one_and_update(
                doc! { "_id": transaction_id, "result_code": Bson::Null },
                doc! { "$set": {
                    "result_code": settlement.result_code.clone(),
                    "result_description": settlement.result_description.clone(),
                    "mpesa_receipt_number": receipt_bson,
                } },
            )
            .await?;

        if updated.is_some() {
            info!(
                "Payment settled: txn={} code={} status={:?}",
                transaction_id.to_hex(),
                settlement.result_code,
                settlement.status
            );
            return Ok(settlement);
        }

        // Lost the CAS: either the id is unknown or the transaction settled
        // earlier. Replay the stored result rather than drawing a second time.
        let stored = self
            .transactions()
            .find_one(doc! { "_id": transaction_id })
            .await?
            .ok_or_else(|| AppError::not_found("Payment transaction not found."))?;

        match (stored.result_code, stored.result_description) {
            (Some(code), description) => {
                info!("Replaying settled payment: txn={}", transaction_id.to_hex());
                let status = match SettlementOutcome::from_result_code(&code) {
                    Some(outcome) => outcome.transaction_status(),
                    None => TransactionStatus::Failed,
                };
                Ok(Settlement {
                    status,
                    result_code: code,
                    result_description: description.unwrap_or_default(),
                    mpesa_receipt_number: stored.mpesa_receipt_number,
                })
            }
            (None, _) => Err(AppError::conflict(
                "Payment transaction is still being resolved.",
            )),
        }
    }
}

fn generate_password(till: &str, passkey: &str, timestamp: &str) -> String {
    let password_string = format!("{}{}{}", till, passkey, timestamp);
    base64.encode(password_string)
}

fn format_phone_number(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with("254") && phone.len() == 12 {
        return phone.to_string();
    }
    if phone.starts_with("07") && phone.len() == 10 {
        return format!("254{}", &phone[1..]);
    }
    if phone.starts_with("7") && phone.len() == 9 {
        return format!("254{}", phone);
    }
    phone.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOutcomeSource {
        outcome: SettlementOutcome,
        serial: u32,
    }

    impl OutcomeSource for FixedOutcomeSource {
        fn draw_outcome(&self) -> SettlementOutcome {
            self.outcome
        }

        fn receipt_serial(&self) -> u32 {
            self.serial
        }
    }

    #[test]
    fn success_settles_with_receipt() {
        let source = FixedOutcomeSource {
            outcome: SettlementOutcome::Success,
            serial: 123_456,
        };
        let settlement = settle(source.draw_outcome(), &source);

        assert_eq!(settlement.status, TransactionStatus::Success);
        assert_eq!(settlement.result_code, "0");
        assert_eq!(settlement.mpesa_receipt_number.as_deref(), Some("NF123456"));
    }

    #[test]
    fn failures_settle_without_receipt() {
        let cases = [
            (SettlementOutcome::InsufficientFunds, "1001"),
            (SettlementOutcome::Cancelled, "1032"),
            (SettlementOutcome::OtherError, "1000"),
        ];

        for (outcome, expected_code) in cases {
            let source = FixedOutcomeSource {
                outcome,
                serial: 999_999,
            };
            let settlement = settle(outcome, &source);

            assert_eq!(settlement.status, TransactionStatus::Failed);
            assert_eq!(settlement.result_code, expected_code);
            assert!(settlement.mpesa_receipt_number.is_none());
        }
    }

    #[test]
    fn result_codes_round_trip() {
        for outcome in [
            SettlementOutcome::Success,
            SettlementOutcome::InsufficientFunds,
            SettlementOutcome::Cancelled,
            SettlementOutcome::OtherError,
        ] {
            assert_eq!(
                SettlementOutcome::from_result_code(outcome.result_code()),
                Some(outcome)
            );
        }
        assert_eq!(SettlementOutcome::from_result_code("9999"), None);
    }

    #[test]
    fn random_source_covers_all_outcomes() {
        let source = RandomOutcomeSource;
        let mut seen = [false; 4];
        for _ in 0..1_000 {
            match source.draw_outcome() {
                SettlementOutcome::Success => seen[0] = true,
                SettlementOutcome::InsufficientFunds => seen[1] = true,
                SettlementOutcome::Cancelled => seen[2] = true,
                SettlementOutcome::OtherError => seen[3] = true,
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn receipt_serials_are_six_digits() {
        let source = RandomOutcomeSource;
        for _ in 0..100 {
            let serial = source.receipt_serial();
            assert!((100_000..1_000_000).contains(&serial));
        }
    }

    #[test]
    fn password_is_base64_of_till_passkey_timestamp() {
        let password = generate_password("174379", "mock_passkey", "20250101120000");
        assert_eq!(password, "MTc0Mzc5bW9ja19wYXNza2V5MjAyNTAxMDExMjAwMDA=");
    }

    #[test]
    fn phone_numbers_normalize_to_msisdn() {
        assert_eq!(format_phone_number("254712345678"), "254712345678");
        assert_eq!(format_phone_number("0712345678"), "254712345678");
        assert_eq!(format_phone_number("712345678"), "254712345678");
        assert_eq!(format_phone_number(" 0712345678 "), "254712345678");
        // Anything unrecognized passes through untouched.
        assert_eq!(format_phone_number("12345"), "12345");
    }
}
