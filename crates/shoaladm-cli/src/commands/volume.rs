use super::forward_exit;
use shoaladm_core::{CredSource, Engine};
use std::path::PathBuf;

pub fn run(
    engine: &Engine,
    config_and_keyring: Option<&str>,
    command: &[String],
) -> Result<u8, String> {
    let creds = config_and_keyring.map(|envelope| {
        let path = (envelope != "-").then(|| PathBuf::from(envelope));
        CredSource::Envelope(path)
    });
    let code = engine
        .volume_helper(command, creds.as_ref())
        .map_err(|e| e.to_string())?;
    Ok(forward_exit(code))
}
