// handlers/payments.rs
//
// The synchronous STK push flow: log the request, wait out the simulated
// callback, then record the sale against the shift and back-link the payment.
// The sale and its payment link stand or fall together; a link failure after
// the sale insert is surfaced for reconciliation, never swallowed.
use axum::{extract::State, response::Json};
use chrono::Utc;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Collection;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::errors::{is_duplicate_key, AppError, Result};
use crate::models::mpesa::MpesaTransaction;
use crate::models::sale::SalesRecord;
use crate::models::shift::PumpShift;
use crate::models::user::User;
use crate::services::mpesa_simulator::Settlement;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StkPushRequest {
    pub mobile_no: Option<String>,
    pub amount: Option<f64>,
    pub sale_id_no: Option<String>,
    pub pump_shift_id: Option<String>,
    pub attendant_id: Option<String>,
}

pub async fn stk_push(
    State(state): State<AppState>,
    Json(payload): Json<StkPushRequest>,
) -> Result<Json<Value>> {
    let (mobile_no, amount, sale_id_no, pump_shift_id, attendant_id) = match (
        payload.mobile_no,
        payload.amount,
        payload.sale_id_no,
        payload.pump_shift_id,
        payload.attendant_id,
    ) {
        (Some(m), Some(am), Some(s), Some(ps), Some(at)) => (m, am, s, ps, at),
        _ => {
            return Err(AppError::validation(
                "Missing required fields for STK Push.",
            ))
        }
    };

    let pump_shift_id = ObjectId::parse_str(&pump_shift_id)?;
    let attendant_id = ObjectId::parse_str(&attendant_id)?;

    // Check the references up front so a bad request never reaches the
    // provider simulation.
    let pump_shifts: Collection<PumpShift> = state.db.collection("pump_shifts");
    pump_shifts
        .find_one(doc! { "_id": pump_shift_id })
        .await?
        .ok_or_else(|| AppError::not_found("Pump shift not found."))?;

    let users: Collection<User> = state.db.collection("users");
    users
        .find_one(doc! { "_id": attendant_id })
        .await?
        .ok_or_else(|| AppError::not_found("Attendant not found."))?;

    let transaction_id = state.simulator.initiate(&mobile_no, amount).await?;
    let settlement = state.simulator.resolve(transaction_id).await?;

    let sale_id = record_sale(
        &state,
        pump_shift_id,
        &sale_id_no,
        attendant_id,
        amount,
        &mobile_no,
        &settlement,
        transaction_id,
    )
    .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "STK Push initiated and transaction simulated.",
        "transaction_status": settlement.status,
        "result_description": settlement.result_description,
        "sale_id": sale_id.to_hex(),
        "mpesa_receipt_number": settlement.mpesa_receipt_number,
    })))
}

/// Persist the sale for a settled payment and back-link the payment row.
///
/// The pump is always derived from the shift instance; a caller-supplied pump
/// id could disagree with the instance and is therefore never accepted.
#[allow(clippy::too_many_arguments)]
async fn record_sale(
    state: &AppState,
    pump_shift_id: ObjectId,
    sale_id_no: &str,
    attendant_id: ObjectId,
    amount: f64,
    customer_mobile_no: &str,
    settlement: &Settlement,
    transaction_id: ObjectId,
) -> Result<ObjectId> {
    let pump_shifts: Collection<PumpShift> = state.db.collection("pump_shifts");
    let instance = pump_shifts
        .find_one(doc! { "_id": pump_shift_id })
        .await?
        .ok_or_else(|| AppError::not_found("Pump shift not found."))?;

    let sale_id = ObjectId::new();
    let sale = SalesRecord {
        _id: Some(sale_id),
        sale_id_no: sale_id_no.to_string(),
        pump_shift_id,
        pump_id: instance.pump_id,
        attendant_id,
        sale_time: Utc::now(),
        amount,
        customer_mobile_no: Some(customer_mobile_no.to_string()),
        mpesa_transaction_code: settlement.mpesa_receipt_number.clone(),
        transaction_status: settlement.status,
    };

    let sales: Collection<SalesRecord> = state.db.collection("sales_records");
    sales.insert_one(&sale).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::conflict("A sale with this sale reference already exists.")
        } else {
            e.into()
        }
    })?;

    let transactions: Collection<MpesaTransaction> =
        state.db.collection("mpesa_transactions");
    let link = transactions
        .update_one(
            doc! { "_id": transaction_id },
            doc! { "$set": { "sale_id": sale_id } },
        )
        .await;

    match link {
        Ok(result) if result.matched_count == 1 => {
            info!(
                "Sale recorded: sale={} txn={} status={:?}",
                sale_id.to_hex(),
                transaction_id.to_hex(),
                settlement.status
            );
            Ok(sale_id)
        }
        Ok(_) => {
            error!(
                "Sale {} recorded but payment {} missing for back-link",
                sale_id.to_hex(),
                transaction_id.to_hex()
            );
            Err(AppError::internal(format!(
                "Sale {} was recorded but payment {} could not be linked; manual reconciliation required.",
                sale_id.to_hex(),
                transaction_id.to_hex()
            )))
        }
        Err(e) => {
            error!(
                "Sale {} recorded but payment {} link write failed: {}",
                sale_id.to_hex(),
                transaction_id.to_hex(),
                e
            );
            Err(AppError::internal(format!(
                "Sale {} was recorded but payment {} could not be linked; manual reconciliation required.",
                sale_id.to_hex(),
                transaction_id.to_hex()
            )))
        }
    }
}
