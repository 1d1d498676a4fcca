use super::{json_pretty, EXIT_SUCCESS};
use composegraph_core::QueryService;

pub fn run(queries: &QueryService<'_>, json: bool) -> Result<u8, String> {
    let services = queries.list_services().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&services)?);
    } else if services.is_empty() {
        println!("no services found");
    } else {
        println!("{:<28} SOURCE_FILE", "SERVICE");
        for s in &services {
            println!("{:<28} {}", s.name, s.source_file);
        }
    }
    Ok(EXIT_SUCCESS)
}
