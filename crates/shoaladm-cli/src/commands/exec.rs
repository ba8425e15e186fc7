use super::{forward_exit, parse_name};
use shoaladm_core::Engine;

pub fn run(
    engine: &Engine,
    name: &str,
    privileged: bool,
    command: &[String],
) -> Result<u8, String> {
    let name = parse_name(name)?;
    let code = engine
        .exec_in(&name, privileged, command)
        .map_err(|e| e.to_string())?;
    Ok(forward_exit(code))
}
