use super::{json_pretty, EXIT_FAILURE, EXIT_SUCCESS};
use composegraph_core::{dispatch, QueryService};
use serde_json::Value;

/// Run a catalog operation by name. The response is always printed as JSON.
pub fn run(queries: &QueryService<'_>, name: &str, params: &str) -> Result<u8, String> {
    let params: Value =
        serde_json::from_str(params).map_err(|e| format!("invalid --params JSON: {e}"))?;
    let response = dispatch(queries, name, &params);
    println!("{}", json_pretty(&response)?);
    Ok(if response.ok { EXIT_SUCCESS } else { EXIT_FAILURE })
}
