use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::crypto::{is_valid_address, normalize_address};
use crate::error::AppError;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WithdrawRequest {
    address: Option<String>,
    #[serde(rename = "amountMicro")]
    amount_micro: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    ok: bool,
    status: &'static str,
    payout_id: String,
    net_amount: u64,
    fee: u64,
}

pub async fn withdraw_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WithdrawRequest>,
) -> Result<Json<WithdrawResponse>, AppError> {
    let (Some(address_raw), Some(amount_micro)) = (body.address.as_deref(), body.amount_micro)
    else {
        return Err(AppError::validation("Missing required fields"));
    };

    if !is_valid_address(address_raw) {
        return Err(AppError::validation("Invalid Ethereum address format"));
    }
    if amount_micro <= 0 {
        return Err(AppError::validation("Invalid amount"));
    }
    let amount_micro = amount_micro as u64;

    let fee_micro = state.config.withdraw_fee_micro();
    if amount_micro <= fee_micro {
        return Err(AppError::validation("Amount must exceed the withdrawal fee"));
    }

    let address = normalize_address(address_raw);
    let payout = state
        .storage
        .withdraw(&address, amount_micro, fee_micro)?
        .ok_or_else(|| AppError::validation("Insufficient balance"))?;

    Ok(Json(WithdrawResponse {
        ok: true,
        status: "queued",
        payout_id: payout.id,
        net_amount: payout.amount_micro,
        fee: payout.fee_micro,
    }))
}
