use super::{format_ref, json_pretty, EXIT_SUCCESS};
use composegraph_core::QueryService;

pub fn run(queries: &QueryService<'_>, json: bool) -> Result<u8, String> {
    let conflicts = queries.port_conflicts().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&conflicts)?);
    } else if conflicts.is_empty() {
        println!("no port conflicts");
    } else {
        for c in &conflicts {
            let services: Vec<String> = c.services.iter().map(format_ref).collect();
            println!(
                "{}",
                console::style(format!("{}/{}", c.host_port, c.protocol)).yellow()
            );
            for s in services {
                println!("  {s}");
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
