use super::EXIT_SUCCESS;
use shoaladm_core::Engine;

pub fn run(engine: &Engine) -> Result<u8, String> {
    let version = engine.version().map_err(|e| e.to_string())?;
    println!("{version}");
    Ok(EXIT_SUCCESS)
}
