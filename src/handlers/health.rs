use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockProcessorView {
    state: &'static str,
    ms_left: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    block_time_ms: u64,
    difficulty_bits: u32,
    max_shares_pb: u64,
    pool_a_reward_tokens: u64,
    pool_b_reward_tokens: u64,
    pool_c_reward_tokens: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    ok: bool,
    block_number: u64,
    uptime_secs: u64,
    block_processor: BlockProcessorView,
    config: ConfigView,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ms_left = state.engine.ms_left();
    Json(HealthResponse {
        ok: true,
        block_number: state.engine.current_block_number(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        block_processor: BlockProcessorView {
            state: if ms_left == 0 { "closing" } else { "open" },
            ms_left,
        },
        config: ConfigView {
            block_time_ms: state.config.block_time_ms,
            difficulty_bits: state.config.difficulty_bits,
            max_shares_pb: state.config.max_shares_pb,
            pool_a_reward_tokens: state.config.pool_a_reward_tokens,
            pool_b_reward_tokens: state.config.pool_b_reward_tokens,
            pool_c_reward_tokens: state.config.pool_c_reward_tokens,
        },
    })
}
