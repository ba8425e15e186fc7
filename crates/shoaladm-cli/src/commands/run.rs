use super::{forward_exit, parse_name};
use shoaladm_core::Engine;

pub fn run(engine: &Engine, name: &str) -> Result<u8, String> {
    let name = parse_name(name)?;
    let code = engine.run_foreground(&name).map_err(|e| e.to_string())?;
    Ok(forward_exit(code))
}
