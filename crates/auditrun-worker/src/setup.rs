//! Setup phase for the hello_world integration.
//!
//! Runs once before any task and produces the base context: credentials,
//! region info, anything tasks read via `ctx.base(..)`. A real
//! integration would authenticate against its provider here and stash
//! client handles.

use std::collections::HashMap;
use std::env;

use serde_json::{json, Value};
use tracing::info;

/// Build the base context for the run.
pub fn authenticate() -> HashMap<String, Value> {
    let token = env::var("AUDIT_CLOUD_TOKEN").unwrap_or_else(|_| "demo-token".to_string());
    let region = env::var("AUDIT_CLOUD_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    info!(region = %region, "Setup phase complete");

    let mut base = HashMap::new();
    base.insert("token".to_string(), json!(token));
    base.insert("region".to_string(), json!(region));
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_context_has_credentials() {
        let base = authenticate();
        assert!(base.contains_key("token"));
        assert!(base.contains_key("region"));
    }
}
