use std::sync::Arc;
use mongodb::Database;

use crate::services::mpesa_simulator::MpesaSimulator;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub simulator: Arc<MpesaSimulator>,
}

impl AppState {
    pub fn new(db: Database, simulator: Arc<MpesaSimulator>) -> Self {
        AppState { db, simulator }
    }
}
