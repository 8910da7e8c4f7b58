// handlers/reports.rs
//
// Filtered, joined retrieval over the sales ledger. Sales documents only
// carry ids, so the report denormalizes through id maps fetched per request.
use axum::{
    extract::{Query, State},
    response::Json,
};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::Collection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

use crate::errors::Result;
use crate::models::pump::Pump;
use crate::models::sale::{SaleView, SalesRecord};
use crate::models::shift::{PumpShift, Shift};
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SalesReportQuery {
    pub pump_id: Option<String>,
    pub attendant_id: Option<String>,
    pub mobile_no: Option<String>,
    pub shift_id: Option<String>,
}

pub async fn sales_report(
    State(state): State<AppState>,
    Query(query): Query<SalesReportQuery>,
) -> Result<Json<Vec<SaleView>>> {
    let pump_id = match query.pump_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(ObjectId::parse_str(raw)?),
        None => None,
    };
    let attendant_id = match query.attendant_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(ObjectId::parse_str(raw)?),
        None => None,
    };
    let mobile_no = query.mobile_no.as_deref().filter(|s| !s.is_empty());

    // The shift-template filter goes through the instances: sales only point
    // at pump_shift documents, which carry the template id.
    let pump_shifts: Collection<PumpShift> = state.db.collection("pump_shifts");
    let shift_instance_ids = match query.shift_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => {
            let shift_id = ObjectId::parse_str(raw)?;
            let cursor = pump_shifts.find(doc! { "shift_id": shift_id }).await?;
            let instances: Vec<PumpShift> = cursor.try_collect().await?;
            let ids: Vec<ObjectId> = instances.iter().filter_map(|i| i._id).collect();
            if ids.is_empty() {
                return Ok(Json(Vec::new()));
            }
            Some(ids)
        }
        None => None,
    };

    let filter = build_sales_filter(
        pump_id,
        attendant_id,
        mobile_no,
        shift_instance_ids.as_deref(),
    );

    let sales_coll: Collection<SalesRecord> = state.db.collection("sales_records");
    let cursor = sales_coll
        .find(filter)
        .sort(doc! { "sale_time": -1 })
        .await?;
    let sales: Vec<SalesRecord> = cursor.try_collect().await?;

    let views = enrich_sales(&state, &sales).await?;
    Ok(Json(views))
}

async fn enrich_sales(state: &AppState, sales: &[SalesRecord]) -> Result<Vec<SaleView>> {
    let pump_ids: HashSet<ObjectId> = sales.iter().map(|s| s.pump_id).collect();
    let attendant_ids: HashSet<ObjectId> = sales.iter().map(|s| s.attendant_id).collect();
    let instance_ids: HashSet<ObjectId> = sales.iter().map(|s| s.pump_shift_id).collect();

    let pumps = fetch_map::<Pump>(state, "pumps", &pump_ids).await?;
    let attendants = fetch_map::<User>(state, "users", &attendant_ids).await?;
    let instances = fetch_map::<PumpShift>(state, "pump_shifts", &instance_ids).await?;

    let shift_ids: HashSet<ObjectId> = instances.values().map(|i| i.shift_id).collect();
    let shifts = fetch_map::<Shift>(state, "shifts", &shift_ids).await?;

    let views = sales
        .iter()
        .map(|sale| {
            let shift_name = instances
                .get(&sale.pump_shift_id)
                .and_then(|i| shifts.get(&i.shift_id))
                .map(|s| s.shift_name.clone())
                .unwrap_or_default();
            SaleView {
                sale_id: sale._id.map(|id| id.to_hex()).unwrap_or_default(),
                sale_id_no: sale.sale_id_no.clone(),
                amount: sale.amount,
                sale_time: sale.sale_time.to_rfc3339(),
                customer_mobile_no: sale.customer_mobile_no.clone(),
                mpesa_transaction_code: sale.mpesa_transaction_code.clone(),
                transaction_status: sale.transaction_status,
                pump_no: pumps
                    .get(&sale.pump_id)
                    .map(|p| p.pump_no.clone())
                    .unwrap_or_default(),
                pump_name: pumps
                    .get(&sale.pump_id)
                    .map(|p| p.pump_name.clone())
                    .unwrap_or_default(),
                shift_name,
                attendant_name: attendants
                    .get(&sale.attendant_id)
                    .map(|u| u.full_name.clone())
                    .unwrap_or_default(),
            }
        })
        .collect();

    Ok(views)
}

async fn fetch_map<T>(
    state: &AppState,
    collection: &str,
    ids: &HashSet<ObjectId>,
) -> Result<HashMap<ObjectId, T>>
where
    T: serde::de::DeserializeOwned + Send + Sync + HasId,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<ObjectId> = ids.iter().copied().collect();
    let coll: Collection<T> = state.db.collection(collection);
    let cursor = coll.find(doc! { "_id": { "$in": ids } }).await?;
    let docs: Vec<T> = cursor.try_collect().await?;

    Ok(docs
        .into_iter()
        .filter_map(|d| d.id().map(|id| (id, d)))
        .collect())
}

/// Anything with an optional Mongo `_id`, so the enrichment maps can be
/// built generically.
trait HasId {
    fn id(&self) -> Option<ObjectId>;
}

impl HasId for Pump {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }
}

impl HasId for User {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }
}

impl HasId for PumpShift {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }
}

impl HasId for Shift {
    fn id(&self) -> Option<ObjectId> {
        self._id
    }
}

fn build_sales_filter(
    pump_id: Option<ObjectId>,
    attendant_id: Option<ObjectId>,
    mobile_no: Option<&str>,
    shift_instance_ids: Option<&[ObjectId]>,
) -> Document {
    let mut filter = Document::new();

    if let Some(pump_id) = pump_id {
        filter.insert("pump_id", pump_id);
    }
    if let Some(attendant_id) = attendant_id {
        filter.insert("attendant_id", attendant_id);
    }
    if let Some(mobile_no) = mobile_no {
        // Substring containment, not a prefix match: no anchors.
        filter.insert(
            "customer_mobile_no",
            doc! { "$regex": regex_escape(mobile_no) },
        );
    }
    if let Some(ids) = shift_instance_ids {
        filter.insert("pump_shift_id", doc! { "$in": ids.to_vec() });
    }

    filter
}

/// Escape a literal for use inside a Mongo `$regex` expression.
fn regex_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if !c.is_ascii_alphanumeric() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub async fn get_filters(State(state): State<AppState>) -> Result<Json<Value>> {
    let sales: Collection<SalesRecord> = state.db.collection("sales_records");
    let attendant_ids: Vec<ObjectId> = sales
        .distinct("attendant_id", doc! {})
        .await?
        .into_iter()
        .filter_map(|b| b.as_object_id())
        .collect();

    let users: Collection<User> = state.db.collection("users");
    let attendants: Vec<User> = if attendant_ids.is_empty() {
        Vec::new()
    } else {
        users
            .find(doc! { "_id": { "$in": attendant_ids } })
            .await?
            .try_collect()
            .await?
    };
    let attendant_list: Vec<Value> = attendants
        .iter()
        .map(|u| {
            json!({
                "id": u._id.map(|id| id.to_hex()).unwrap_or_default(),
                "name": u.full_name,
            })
        })
        .collect();

    let pumps: Collection<Pump> = state.db.collection("pumps");
    let all_pumps: Vec<Pump> = pumps.find(doc! {}).await?.try_collect().await?;
    let pump_list: Vec<Value> = all_pumps
        .iter()
        .map(|p| {
            json!({
                "id": p._id.map(|id| id.to_hex()).unwrap_or_default(),
                "name": p.pump_name,
                "no": p.pump_no,
            })
        })
        .collect();

    let shifts: Collection<Shift> = state.db.collection("shifts");
    let all_shifts: Vec<Shift> = shifts.find(doc! {}).await?.try_collect().await?;
    let shift_list: Vec<Value> = all_shifts
        .iter()
        .map(|s| {
            json!({
                "id": s._id.map(|id| id.to_hex()).unwrap_or_default(),
                "name": s.shift_name,
            })
        })
        .collect();

    Ok(Json(json!({
        "attendants": attendant_list,
        "pumps": pump_list,
        "shifts": shift_list,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    #[test]
    fn empty_query_builds_empty_filter() {
        let filter = build_sales_filter(None, None, None, None);
        assert!(filter.is_empty());
    }

    #[test]
    fn mobile_filter_is_unanchored_substring() {
        let filter = build_sales_filter(None, None, Some("2345"), None);
        let clause = filter.get_document("customer_mobile_no").unwrap();
        assert_eq!(clause.get_str("$regex").unwrap(), "2345");
    }

    #[test]
    fn mobile_filter_escapes_regex_metacharacters() {
        assert_eq!(regex_escape("07*12"), "07\\*12");
        assert_eq!(regex_escape("+254"), "\\+254");
        assert_eq!(regex_escape("0712345678"), "0712345678");
    }

    #[test]
    fn shift_filter_constrains_instance_ids() {
        let ids = vec![ObjectId::new(), ObjectId::new()];
        let filter = build_sales_filter(None, None, None, Some(&ids));
        let clause = filter.get_document("pump_shift_id").unwrap();
        match clause.get("$in") {
            Some(Bson::Array(values)) => assert_eq!(values.len(), 2),
            other => panic!("expected $in array, got {:?}", other),
        }
    }

    #[test]
    fn id_filters_land_on_their_fields() {
        let pump = ObjectId::new();
        let attendant = ObjectId::new();
        let filter = build_sales_filter(Some(pump), Some(attendant), None, None);
        assert_eq!(filter.get_object_id("pump_id").unwrap(), pump);
        assert_eq!(filter.get_object_id("attendant_id").unwrap(), attendant);
    }
}
