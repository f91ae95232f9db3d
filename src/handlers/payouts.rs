use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::error::AppError;
use crate::storage::PayoutStatus;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutView {
    id: String,
    address: String,
    amount_micro: u64,
    fee_micro: u64,
    status: &'static str,
    created_at: i64,
    updated_at: i64,
    tx_hash: Option<String>,
}

#[derive(Serialize)]
pub struct PayoutsResponse {
    ok: bool,
    payouts: Vec<PayoutView>,
}

pub async fn payouts(State(state): State<Arc<AppState>>) -> Result<Json<PayoutsResponse>, AppError> {
    let pending = state.storage.list_pending_payouts()?;
    let payouts = pending
        .into_iter()
        .map(|p| PayoutView {
            id: p.id,
            address: p.address,
            amount_micro: p.amount_micro,
            fee_micro: p.fee_micro,
            status: match p.status {
                PayoutStatus::Pending => "pending",
                PayoutStatus::Sent => "sent",
                PayoutStatus::Failed => "failed",
            },
            created_at: p.created_at,
            updated_at: p.updated_at,
            tx_hash: p.tx_hash,
        })
        .collect();

    Ok(Json(PayoutsResponse { ok: true, payouts }))
}
