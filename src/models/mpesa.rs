use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;
use mongodb::bson;

/// One simulated STK push request and, once the callback fires, its result.
///
/// The result triple (`result_code`, `result_description`,
/// `mpesa_receipt_number`) is write-once: absent at request time, set exactly
/// once when the simulated callback resolves, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpesaTransaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    /// Back-link to the sale this payment produced, set when the sale is
    /// recorded.
    pub sale_id: Option<ObjectId>,
    pub mobile_no: String,
    pub amount: f64,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub request_time: DateTime<Utc>,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub response_code: String,
    pub response_description: String,

    pub result_code: Option<String>,
    pub result_description: Option<String>,
    pub mpesa_receipt_number: Option<String>,
}
