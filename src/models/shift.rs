use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;
use mongodb::bson;

/// Shift template: a named time-of-day category ("Day Shift", "Night Shift"),
/// not a running window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub shift_name: String,
}

/// One concrete opening-to-closing operating window of a pump.
///
/// At most one document per pump may have `is_closed == false`; the partial
/// unique index created at seed time carries that invariant across server
/// instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpShift {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub pump_id: ObjectId,
    pub shift_id: ObjectId,
    pub opening_attendant_id: ObjectId,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub opening_time: DateTime<Utc>,
    pub opening_meter_reading: f64,

    pub closing_attendant_id: Option<ObjectId>,
    pub closing_time: Option<bson::DateTime>,
    pub closing_meter_reading: Option<f64>,
    pub is_closed: bool,
}

#[derive(Debug, Serialize)]
pub struct ShiftView {
    pub shift_id: String,
    pub shift_name: String,
}

impl From<&Shift> for ShiftView {
    fn from(shift: &Shift) -> Self {
        ShiftView {
            shift_id: shift._id.map(|id| id.to_hex()).unwrap_or_default(),
            shift_name: shift.shift_name.clone(),
        }
    }
}
