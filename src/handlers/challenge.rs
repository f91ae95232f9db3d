use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    ok: bool,
    block_number: u64,
    seed_hex: String,
    difficulty_bits: u32,
    block_time_ms: u64,
    server_time_ms: i64,
    ms_left: u64,
}

pub async fn challenge(State(state): State<Arc<AppState>>) -> Json<ChallengeResponse> {
    let engine = &state.engine;
    Json(ChallengeResponse {
        ok: true,
        block_number: engine.current_block_number(),
        seed_hex: engine.current_seed_hex(),
        difficulty_bits: state.config.difficulty_bits,
        block_time_ms: state.config.block_time_ms,
        server_time_ms: chrono::Utc::now().timestamp_millis(),
        ms_left: engine.ms_left(),
    })
}
