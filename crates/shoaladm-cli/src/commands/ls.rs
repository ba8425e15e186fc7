use super::{colorize_flag, json_pretty, EXIT_SUCCESS};
use shoaladm_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let listings = engine.list().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&listings)?);
    } else if listings.is_empty() {
        println!("no daemons found");
    } else {
        println!(
            "{:<10} {:<20} {:<38} {:<8} ACTIVE",
            "STYLE", "NAME", "CLUSTER", "ENABLED"
        );
        for daemon in &listings {
            println!(
                "{:<10} {:<20} {:<38} {:<8} {}",
                daemon.style,
                daemon.name,
                daemon.cluster_id,
                colorize_flag(daemon.enabled, "yes"),
                colorize_flag(daemon.active, "yes"),
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
