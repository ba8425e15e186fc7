use super::{parse_name, EXIT_SUCCESS};
use shoaladm_core::Engine;

pub fn run(engine: &Engine, name: &str, force: bool) -> Result<u8, String> {
    let name = parse_name(name)?;
    engine
        .remove_daemon(&name, force)
        .map_err(|e| e.to_string())?;
    println!("removed {name}");
    Ok(EXIT_SUCCESS)
}
