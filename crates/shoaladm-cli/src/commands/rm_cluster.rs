use super::EXIT_SUCCESS;
use shoaladm_core::Engine;

pub fn run(engine: &Engine, force: bool) -> Result<u8, String> {
    engine.remove_cluster(force).map_err(|e| e.to_string())?;
    println!("removed cluster");
    Ok(EXIT_SUCCESS)
}
