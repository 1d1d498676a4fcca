use super::{format_ref, json_pretty, EXIT_SUCCESS};
use composegraph_core::{QueryService, ServiceRef};

fn print_list(label: &str, refs: &[ServiceRef]) {
    if refs.is_empty() {
        println!("  {label}: (none)");
    } else {
        let names: Vec<String> = refs.iter().map(format_ref).collect();
        println!("  {label}: {}", names.join(", "));
    }
}

pub fn run(
    queries: &QueryService<'_>,
    service: &str,
    source_file: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let reports = queries
        .service_dependencies(service, source_file)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&reports)?);
    } else if reports.is_empty() {
        println!("no service named '{service}'");
    } else {
        for r in &reports {
            println!("{} ({})", r.name, r.source_file);
            print_list("depends on", &r.depends_on);
            print_list("required by", &r.required_by);
        }
    }
    Ok(EXIT_SUCCESS)
}
