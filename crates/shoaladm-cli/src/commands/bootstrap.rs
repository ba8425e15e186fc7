use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use shoaladm_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let pb = spinner("bootstrapping cluster...");
    match engine.bootstrap() {
        Ok(identity) => {
            spin_ok(
                &pb,
                &format!("cluster {} bootstrapped", identity.cluster_id),
            );
            if json {
                println!("{}", json_pretty(&identity)?);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            spin_fail(&pb, "bootstrap failed");
            Err(e.to_string())
        }
    }
}
