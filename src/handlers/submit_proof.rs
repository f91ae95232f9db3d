use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::crypto::{hash_share, is_valid_address, normalize_address};
use crate::error::AppError;

const MAX_NONCE_LEN: usize = 256;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitProofRequest {
    address: Option<String>,
    nonce: Option<String>,
    /// Optional client-declared block number. The server binds the
    /// submission to whatever block is current at acceptance time; a
    /// declared number is only used to reject stale submissions outright.
    #[serde(rename = "blockNumber")]
    block_number: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProofResponse {
    ok: bool,
    accepted: bool,
    block_number: u64,
    leading_zero_bits: u32,
    hash: String,
}

pub async fn submit_proof(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<SubmitProofRequest>,
) -> Result<Json<SubmitProofResponse>, AppError> {
    if !state.rate_limiter_submit.check(&addr.ip().to_string()) {
        return Err(AppError::policy(
            "Maximum requests exceeded",
            StatusCode::TOO_MANY_REQUESTS,
        ));
    }

    let (Some(address_raw), Some(nonce)) = (body.address.as_deref(), body.nonce.as_deref())
    else {
        return Err(AppError::validation("Missing required fields"));
    };

    if !is_valid_address(address_raw) {
        return Err(AppError::validation("Invalid Ethereum address format"));
    }
    if nonce.is_empty() || nonce.len() > MAX_NONCE_LEN {
        return Err(AppError::validation("Invalid nonce format"));
    }
    let address = normalize_address(address_raw);

    let storage = Arc::clone(&state.storage);
    let difficulty_bits = state.config.difficulty_bits;
    let max_shares = state.config.max_shares_pb;
    let declared_block = body.block_number;

    let response = state.engine.with_open_epoch(move |block_number, seed_hex| {
        if let Some(declared) = declared_block {
            if declared != block_number {
                return Err(AppError::conflict("Block number mismatch"));
            }
        }

        let count = storage.share_count(block_number, &address)?;
        if count >= max_shares {
            return Err(AppError::policy(
                "Maximum shares per block exceeded",
                StatusCode::TOO_MANY_REQUESTS,
            ));
        }

        let share = hash_share(&address, block_number, seed_hex, nonce);
        if share.leading_zero_bits < difficulty_bits {
            return Err(AppError::validation("Insufficient proof-of-work"));
        }

        let inserted = storage.insert_share(block_number, &address, nonce, &share.hash_hex)?;
        if !inserted {
            return Err(AppError::conflict("Duplicate share"));
        }

        Ok(SubmitProofResponse {
            ok: true,
            accepted: true,
            block_number,
            leading_zero_bits: share.leading_zero_bits,
            hash: share.hash_hex,
        })
    })?;

    Ok(Json(response))
}
