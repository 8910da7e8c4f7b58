// handlers/shifts.rs
//
// Pump availability and the OPEN → CLOSED shift state machine. The open-side
// invariant (one open instance per pump) lives in the partial unique index;
// the close is a single compare-and-swap, so a closed instance can never be
// re-closed or mutated again.
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson};
use mongodb::bson;
use mongodb::Collection;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::errors::{is_duplicate_key, AppError, Result};
use crate::models::pump::{Pump, PumpStatusView};
use crate::models::shift::{PumpShift, Shift, ShiftView};
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenShiftRequest {
    pub pump_id: Option<String>,
    pub shift_id: Option<String>,
    pub attendant_id: Option<String>,
    pub opening_meter_reading: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CloseShiftRequest {
    pub pump_shift_id: Option<String>,
    pub closing_attendant_id: Option<String>,
    pub closing_meter_reading: Option<f64>,
}

pub async fn get_pumps(State(state): State<AppState>) -> Result<Json<Vec<PumpStatusView>>> {
    let pumps: Collection<Pump> = state.db.collection("pumps");
    let pump_shifts: Collection<PumpShift> = state.db.collection("pump_shifts");

    let cursor = pumps.find(doc! { "is_active": true }).await?;
    let all_pumps: Vec<Pump> = cursor.try_collect().await?;

    let mut result = Vec::with_capacity(all_pumps.len());
    for pump in all_pumps {
        let pump_id = match pump._id {
            Some(id) => id,
            None => continue,
        };
        let current = pump_shifts
            .find_one(doc! { "pump_id": pump_id, "is_closed": false })
            .await?;
        result.push(PumpStatusView {
            pump_id: pump_id.to_hex(),
            pump_no: pump.pump_no,
            pump_name: pump.pump_name,
            is_shift_open: current.is_some(),
            current_shift_id: current.and_then(|s| s._id).map(|id| id.to_hex()),
        });
    }

    Ok(Json(result))
}

pub async fn get_shifts(State(state): State<AppState>) -> Result<Json<Vec<ShiftView>>> {
    let shifts: Collection<Shift> = state.db.collection("shifts");
    let cursor = shifts.find(doc! {}).await?;
    let all_shifts: Vec<Shift> = cursor.try_collect().await?;

    Ok(Json(all_shifts.iter().map(ShiftView::from).collect()))
}

pub async fn open_shift(
    State(state): State<AppState>,
    Json(payload): Json<OpenShiftRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let (pump_id, shift_id, attendant_id, opening_meter_reading) = match (
        payload.pump_id,
        payload.shift_id,
        payload.attendant_id,
        payload.opening_meter_reading,
    ) {
        (Some(p), Some(s), Some(a), Some(r)) => (p, s, a, r),
        _ => {
            return Err(AppError::validation(
                "Missing required fields to open a shift.",
            ))
        }
    };

    let pump_id = ObjectId::parse_str(&pump_id)?;
    let shift_id = ObjectId::parse_str(&shift_id)?;
    let attendant_id = ObjectId::parse_str(&attendant_id)?;
    validate_meter_reading(opening_meter_reading)?;

    let pumps: Collection<Pump> = state.db.collection("pumps");
    let pump = pumps
        .find_one(doc! { "_id": pump_id })
        .await?
        .ok_or_else(|| AppError::not_found("Pump not found."))?;
    if !pump.is_active {
        return Err(AppError::validation("Pump is not active."));
    }

    let shifts: Collection<Shift> = state.db.collection("shifts");
    shifts
        .find_one(doc! { "_id": shift_id })
        .await?
        .ok_or_else(|| AppError::not_found("Shift not found."))?;

    let users: Collection<User> = state.db.collection("users");
    let attendant = users
        .find_one(doc! { "_id": attendant_id })
        .await?
        .ok_or_else(|| AppError::not_found("Attendant not found."))?;
    if !attendant.is_active {
        return Err(AppError::validation("Attendant account is deactivated."));
    }

    let pump_shift_id = ObjectId::new();
    let instance = PumpShift {
        _id: Some(pump_shift_id),
        pump_id,
        shift_id,
        opening_attendant_id: attendant_id,
        opening_time: Utc::now(),
        opening_meter_reading,
        closing_attendant_id: None,
        closing_time: None,
        closing_meter_reading: None,
        is_closed: false,
    };

    let pump_shifts: Collection<PumpShift> = state.db.collection("pump_shifts");
    pump_shifts.insert_one(&instance).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::conflict("Shift is already open for this pump.")
        } else {
            e.into()
        }
    })?;

    info!(
        "Shift opened: pump={} instance={} attendant={}",
        pump.pump_no,
        pump_shift_id.to_hex(),
        attendant.username
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Shift opened successfully",
            "pump_shift_id": pump_shift_id.to_hex(),
        })),
    ))
}

pub async fn close_shift(
    State(state): State<AppState>,
    Json(payload): Json<CloseShiftRequest>,
) -> Result<Json<Value>> {
    let (pump_shift_id, closing_attendant_id, closing_meter_reading) = match (
        payload.pump_shift_id,
        payload.closing_attendant_id,
        payload.closing_meter_reading,
    ) {
        (Some(i), Some(a), Some(r)) => (i, a, r),
        _ => {
            return Err(AppError::validation(
                "Missing required fields to close a shift.",
            ))
        }
    };

    let pump_shift_id = ObjectId::parse_str(&pump_shift_id)?;
    let closing_attendant_id = ObjectId::parse_str(&closing_attendant_id)?;
    validate_meter_reading(closing_meter_reading)?;

    let pump_shifts: Collection<PumpShift> = state.db.collection("pump_shifts");
    let instance = pump_shifts
        .find_one(doc! { "_id": pump_shift_id })
        .await?
        .ok_or_else(|| AppError::not_found("Shift not found."))?;

    if instance.is_closed {
        return Err(AppError::conflict("Shift is already closed."));
    }

    validate_closing_reading(instance.opening_meter_reading, closing_meter_reading)?;

    let users: Collection<User> = state.db.collection("users");
    users
        .find_one(doc! { "_id": closing_attendant_id })
        .await?
        .ok_or_else(|| AppError::not_found("Attendant not found."))?;

    // CAS on the open flag: if another close landed between the read above
    // and this write, the filter no longer matches and nothing is mutated.
    let update_result = pump_shifts
        .update_one(
            doc! { "_id": pump_shift_id, "is_closed": false },
            doc! { "$set": {
                "closing_attendant_id": closing_attendant_id,
                "closing_time": Bson::DateTime(bson::DateTime::now()),
                "closing_meter_reading": closing_meter_reading,
                "is_closed": true,
            } },
        )
        .await?;

    if update_result.modified_count == 0 {
        return Err(AppError::conflict("Shift is already closed."));
    }

    info!("Shift closed: instance={}", pump_shift_id.to_hex());

    Ok(Json(json!({
        "status": "success",
        "message": "Shift closed successfully",
    })))
}

fn validate_meter_reading(reading: f64) -> Result<()> {
    if !reading.is_finite() || reading < 0.0 {
        return Err(AppError::validation(
            "Meter reading must be a non-negative number.",
        ));
    }
    Ok(())
}

fn validate_closing_reading(opening: f64, closing: f64) -> Result<()> {
    if closing < opening {
        return Err(AppError::validation(
            "Closing meter reading cannot be less than the opening reading.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_reading_must_be_non_negative() {
        assert!(validate_meter_reading(0.0).is_ok());
        assert!(validate_meter_reading(100.0).is_ok());
        assert!(validate_meter_reading(-0.01).is_err());
        assert!(validate_meter_reading(f64::NAN).is_err());
        assert!(validate_meter_reading(f64::INFINITY).is_err());
    }

    #[test]
    fn closing_reading_cannot_run_backwards() {
        assert!(validate_closing_reading(100.0, 100.0).is_ok());
        assert!(validate_closing_reading(100.0, 250.5).is_ok());
        assert!(validate_closing_reading(100.0, 99.99).is_err());
    }
}
