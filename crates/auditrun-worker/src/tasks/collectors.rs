//! Collectors: gather facts from the target environment.

use anyhow::Result;
use auditrun_engine::TaskHandle;
use serde_json::{json, Value};

/// List all storage buckets.
///
/// Simulated inventory; a real integration would call the provider API
/// with the credentials from the base context.
pub async fn list_buckets(ctx: TaskHandle) -> Result<Value> {
    ctx.log("Connecting to storage API");
    let _token = ctx.base_or("token", json!(null));
    ctx.log("Listing all buckets");

    let buckets = json!([
        {"name": "bucket_1", "region": "us-east-1", "encrypted": true, "public": false},
        {"name": "bucket_2", "region": "us-west-2", "encrypted": false, "public": true}
    ]);
    let count = buckets.as_array().map(Vec::len).unwrap_or(0);

    ctx.log(&format!("Found {count} buckets"));

    Ok(json!({
        "data": {
            "buckets": buckets,
            "count": count
        }
    }))
}
