//! `/api/settings` and `/api/config` GET/PATCH (spec §6, SPEC_FULL.md
//! §13). Grounded on `original_source/src/api/routers/settings.py`'s
//! update-dict response shape.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UpdateResponse {
    message: String,
    updated: Value,
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Value> {
    Json(state.settings.masked_settings())
}

pub async fn patch_settings(
    State(state): State<AppState>,
    Json(update): Json<Value>,
) -> AppResult<Json<UpdateResponse>> {
    let applied = state.settings.update_settings(&update)?;
    Ok(Json(update_response(applied)))
}

pub async fn get_config(State(state): State<AppState>) -> Json<Value> {
    Json(state.settings.masked_config())
}

pub async fn patch_config(
    State(state): State<AppState>,
    Json(update): Json<Value>,
) -> Json<UpdateResponse> {
    let applied = state.settings.update_config(&update);
    Json(update_response(applied))
}

fn update_response(applied: Vec<(String, Value)>) -> UpdateResponse {
    if applied.is_empty() {
        UpdateResponse {
            message: "更新する項目がありません".to_string(),
            updated: Value::Object(serde_json::Map::new()),
        }
    } else {
        let mut updated = serde_json::Map::new();
        for (key, value) in applied {
            updated.insert(key, value);
        }
        UpdateResponse {
            message: "設定を更新しました".to_string(),
            updated: Value::Object(updated),
        }
    }
}
