use super::{json_pretty, EXIT_SUCCESS};
use composegraph_core::catalog::{listing, OPERATIONS};

pub fn run(json: bool) -> Result<u8, String> {
    if json {
        println!("{}", json_pretty(&listing())?);
        return Ok(EXIT_SUCCESS);
    }
    for op in OPERATIONS {
        let params: Vec<String> = op
            .parameters
            .iter()
            .map(|p| {
                if p.required {
                    p.name.to_owned()
                } else {
                    format!("[{}]", p.name)
                }
            })
            .collect();
        println!("{:<28} {:<24} {}", op.name, params.join(" "), op.description);
    }
    Ok(EXIT_SUCCESS)
}
