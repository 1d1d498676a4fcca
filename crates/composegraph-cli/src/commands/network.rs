use super::{format_ref, json_pretty, EXIT_SUCCESS};
use composegraph_core::QueryService;

pub fn run(queries: &QueryService<'_>, network: &str, json: bool) -> Result<u8, String> {
    let members = queries
        .network_members(network)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&members)?);
    } else if members.is_empty() {
        println!("no services on network '{network}'");
    } else {
        for m in &members {
            println!("{}", format_ref(m));
        }
    }
    Ok(EXIT_SUCCESS)
}
