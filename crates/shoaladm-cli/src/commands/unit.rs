use super::{parse_name, EXIT_SUCCESS};
use shoaladm_core::Engine;

pub fn run(engine: &Engine, name: &str, action: &str) -> Result<u8, String> {
    let name = parse_name(name)?;
    engine
        .unit_action(&name, action)
        .map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
