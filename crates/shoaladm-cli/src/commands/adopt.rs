use super::{parse_name, EXIT_SUCCESS};
use shoaladm_core::Engine;

pub fn run(engine: &Engine, name: &str, style: &str, cluster: &str) -> Result<u8, String> {
    let name = parse_name(name)?;
    engine
        .adopt(&name, style, cluster)
        .map_err(|e| e.to_string())?;
    println!("adopted {name}");
    Ok(EXIT_SUCCESS)
}
