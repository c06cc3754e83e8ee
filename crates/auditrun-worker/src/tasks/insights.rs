//! Insights: evaluate collected facts and flag policy violations.

use anyhow::Result;
use auditrun_engine::TaskHandle;
use serde_json::{json, Value};

fn buckets_from(data: &Value) -> Vec<Value> {
    data.get("buckets")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Flag buckets that allow public access.
pub async fn check_public_buckets(ctx: TaskHandle) -> Result<Value> {
    let data = ctx.data_of("list_buckets");
    let buckets = buckets_from(&data);
    ctx.log(&format!("Checking {} buckets for public access", buckets.len()));

    let public: Vec<Value> = buckets
        .iter()
        .filter(|bucket| bucket.get("public").and_then(Value::as_bool) == Some(true))
        .cloned()
        .collect();

    if public.is_empty() {
        return Ok(json!({
            "data": {"total_buckets": buckets.len(), "public_buckets": []},
            "message": "No public buckets found"
        }));
    }

    Ok(json!({
        "violation": true,
        "data": {
            "total_buckets": buckets.len(),
            "public_buckets": public
        },
        "message": format!("Found {} public bucket(s)", public.len())
    }))
}

/// Flag buckets stored without encryption at rest.
pub async fn check_bucket_encryption(ctx: TaskHandle) -> Result<Value> {
    let data = ctx.data_of("list_buckets");
    let buckets = buckets_from(&data);
    ctx.log(&format!("Checking {} buckets for encryption", buckets.len()));

    let unencrypted: Vec<Value> = buckets
        .iter()
        .filter(|bucket| bucket.get("encrypted").and_then(Value::as_bool) != Some(true))
        .cloned()
        .collect();

    if unencrypted.is_empty() {
        return Ok(json!({
            "data": {"total_buckets": buckets.len(), "unencrypted_buckets": []},
            "message": "All buckets encrypted"
        }));
    }

    Ok(json!({
        "violation": true,
        "data": {
            "total_buckets": buckets.len(),
            "unencrypted_buckets": unencrypted
        },
        "message": format!("Found {} unencrypted bucket(s)", unencrypted.len())
    }))
}
