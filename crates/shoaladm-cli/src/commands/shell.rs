use super::forward_exit;
use shoaladm_core::Engine;
use std::path::Path;

pub fn run(
    engine: &Engine,
    name: Option<&str>,
    config: Option<&Path>,
    keyring: Option<&Path>,
) -> Result<u8, String> {
    let code = engine
        .shell(name, config, keyring)
        .map_err(|e| e.to_string())?;
    Ok(forward_exit(code))
}
