use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pump {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub pump_no: String,
    pub pump_name: String,
    pub is_active: bool,
}

/// Pump listing row with the live shift status the attendant app keys off.
#[derive(Debug, Serialize)]
pub struct PumpStatusView {
    pub pump_id: String,
    pub pump_no: String,
    pub pump_name: String,
    pub is_shift_open: bool,
    pub current_shift_id: Option<String>,
}
