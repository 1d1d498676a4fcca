use super::{json_pretty, EXIT_SUCCESS};
use composegraph_store::GraphStore;

pub fn run(store: &dyn GraphStore, endpoint: &str, json: bool) -> Result<u8, String> {
    store
        .open_session()
        .map_err(|e| format!("store error: {e}"))?;
    if json {
        let payload = serde_json::json!({
            "endpoint": endpoint,
            "backend": store.name(),
            "reachable": true,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{} store at {endpoint} is reachable", store.name());
    }
    Ok(EXIT_SUCCESS)
}
