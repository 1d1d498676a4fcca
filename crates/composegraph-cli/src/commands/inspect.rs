use super::{json_pretty, EXIT_SUCCESS};
use composegraph_core::QueryService;

pub fn run(
    queries: &QueryService<'_>,
    service: &str,
    source_file: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    let details = queries
        .service_details(service, source_file)
        .map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&details)?);
        return Ok(EXIT_SUCCESS);
    }
    if details.is_empty() {
        println!("no service named '{service}'");
    }
    for (i, d) in details.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("service:     {}", d.name);
        println!("source_file: {}", d.source_file);
        match &d.image {
            Some(image) => println!("image:       {}:{}", image.name, image.tag),
            None => println!("image:       (none)"),
        }
        for p in &d.ports {
            println!("port:        {}:{}/{}", p.host_port, p.container_port, p.protocol);
        }
        for e in &d.environment {
            println!("env:         {}={}", e.key, e.value);
        }
        for v in &d.volumes {
            match &v.mode {
                Some(mode) => println!("volume:      {}:{}:{mode}", v.host_path, v.container_path),
                None => println!("volume:      {}:{}", v.host_path, v.container_path),
            }
        }
        if !d.networks.is_empty() {
            println!("networks:    {}", d.networks.join(", "));
        }
    }
    Ok(EXIT_SUCCESS)
}
