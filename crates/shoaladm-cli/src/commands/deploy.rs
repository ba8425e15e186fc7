use super::{parse_name, EXIT_SUCCESS};
use shoaladm_core::{CredSource, Engine, KeyringSource};
use std::path::{Path, PathBuf};

#[allow(clippy::too_many_arguments)]
pub fn run(
    engine: &Engine,
    name: &str,
    config_and_keyring: Option<&str>,
    config: Option<&Path>,
    keyring: Option<PathBuf>,
    key: Option<String>,
    osd_fsid: Option<&str>,
) -> Result<u8, String> {
    let name = parse_name(name)?;

    let creds = if let Some(envelope) = config_and_keyring {
        let path = (envelope != "-").then(|| PathBuf::from(envelope));
        CredSource::Envelope(path)
    } else if let Some(config) = config {
        let keyring = if let Some(path) = keyring {
            KeyringSource::File(path)
        } else if let Some(key) = key {
            KeyringSource::Literal(key)
        } else {
            return Err("no keyring source: pass --config-and-keyring, --keyring, or --key".to_owned());
        };
        CredSource::Files {
            config: config.to_path_buf(),
            keyring,
        }
    } else {
        return Err("no config source: pass --config-and-keyring or --config".to_owned());
    };

    engine
        .deploy(&name, &creds, osd_fsid)
        .map_err(|e| e.to_string())?;
    println!("deployed {name}");
    Ok(EXIT_SUCCESS)
}
