use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::crypto::{is_valid_address, normalize_address};
use crate::error::AppError;

#[derive(Deserialize)]
pub struct StatusQuery {
    address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    ok: bool,
    block_number: u64,
    seed_hex: String,
    difficulty_bits: u32,
    pool_a_reward_micro: u64,
    pool_b_reward_micro: u64,
    balance_micro: u64,
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    if !is_valid_address(&query.address) {
        return Err(AppError::validation("Invalid Ethereum address format"));
    }
    let address = normalize_address(&query.address);
    let balance_micro = state.storage.get_balance(&address)?;

    Ok(Json(StatusResponse {
        ok: true,
        block_number: state.engine.current_block_number(),
        seed_hex: state.engine.current_seed_hex(),
        difficulty_bits: state.config.difficulty_bits,
        pool_a_reward_micro: state.config.pool_a_micro(),
        pool_b_reward_micro: state.config.pool_b_micro(),
        balance_micro,
    }))
}
