use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;
use mongodb::bson;

/// Terminal state of the payment attempt backing a sale. PENDING only occurs
/// for a sale recorded against a payment that has not settled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    /// Caller-supplied external reference, unique across all sales.
    pub sale_id_no: String,
    pub pump_shift_id: ObjectId,
    pub pump_id: ObjectId,
    pub attendant_id: ObjectId,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub sale_time: DateTime<Utc>,
    pub amount: f64,
    pub customer_mobile_no: Option<String>,
    /// M-Pesa receipt number; only present for settled SUCCESS payments.
    pub mpesa_transaction_code: Option<String>,
    pub transaction_status: TransactionStatus,
}

/// Denormalized report row: sale fields joined with pump, shift template and
/// attendant display names.
#[derive(Debug, Serialize)]
pub struct SaleView {
    pub sale_id: String,
    pub sale_id_no: String,
    pub amount: f64,
    pub sale_time: String,
    pub customer_mobile_no: Option<String>,
    pub mpesa_transaction_code: Option<String>,
    pub transaction_status: TransactionStatus,
    pub pump_no: String,
    pub pump_name: String,
    pub shift_name: String,
    pub attendant_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_status_uses_upper_case_wire_names() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Failed).unwrap(),
            "\"FAILED\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Pending).unwrap(),
            "\"PENDING\""
        );
    }
}
