mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_EXTERNAL_ERROR, EXIT_FAILURE, EXIT_STORE_ERROR, EXIT_VALIDATION_ERROR};
use shoaladm_core::{install_signal_handler, Engine, RunConfig};
use shoaladm_runtime::{find_engine, Systemctl};
use shoaladm_schema::MonAddr;
use shoaladm_store::{Ownership, StoreLayout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "shoaladm",
    version,
    about = "Bootstrap and manage containerized shoal cluster daemons"
)]
struct Cli {
    /// Daemon data directory root.
    #[arg(long, default_value = "/var/lib/shoal", global = true)]
    data_dir: PathBuf,

    /// Daemon log directory root.
    #[arg(long, default_value = "/var/log/shoal", global = true)]
    log_dir: PathBuf,

    /// systemd unit directory.
    #[arg(long, default_value = "/etc/systemd/system", global = true)]
    unit_dir: PathBuf,

    /// Use docker even when podman is available.
    #[arg(long, default_value_t = false, global = true)]
    docker: bool,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the daemon version shipped in a container image.
    Version {
        #[arg(long)]
        image: String,
    },
    /// Bootstrap a new single-host cluster: one monitor, one manager.
    Bootstrap {
        #[arg(long)]
        image: String,
        /// Cluster id to adopt; generated when omitted.
        #[arg(long)]
        fsid: Option<String>,
        /// Monitor id (defaults to the hostname).
        #[arg(long)]
        mon_id: Option<String>,
        /// Manager id (defaults to the hostname).
        #[arg(long)]
        mgr_id: Option<String>,
        /// Monitor address.
        #[arg(long)]
        mon_ip: Option<String>,
        /// Monitor public network (alternative to --mon-ip).
        #[arg(long, conflicts_with = "mon_ip")]
        mon_network: Option<String>,
        /// Monitor address vector (alternative to --mon-ip).
        #[arg(long, conflicts_with = "mon_ip")]
        mon_addrv: Option<String>,
        /// Daemon uid inside the image (extracted from it when omitted).
        #[arg(long, requires = "gid")]
        uid: Option<u32>,
        /// Daemon gid inside the image.
        #[arg(long, requires = "uid")]
        gid: Option<u32>,
        /// Write the administrator keyring here.
        #[arg(long)]
        output_keyring: Option<PathBuf>,
        /// Write the minimal cluster config here.
        #[arg(long)]
        output_config: Option<PathBuf>,
        /// Write the orchestration public ssh key here.
        #[arg(long)]
        output_pub_ssh_key: Option<PathBuf>,
        /// Skip the ssh orchestration setup entirely.
        #[arg(long, default_value_t = false)]
        skip_ssh: bool,
        /// Seconds between manager readiness polls.
        #[arg(long, default_value_t = 2)]
        wait_interval: u64,
        /// Readiness polls before giving up.
        #[arg(long, default_value_t = 60)]
        wait_attempts: u32,
    },
    /// Create and start one daemon (`<kind>.<id>`).
    Deploy {
        /// Daemon to deploy, as `<kind>.<id>`.
        name: String,
        #[arg(long)]
        image: String,
        #[arg(long)]
        fsid: String,
        /// JSON envelope with config and keyring; `-` reads stdin.
        #[arg(long)]
        config_and_keyring: Option<String>,
        /// Cluster config file (with --keyring or --key).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Keyring file for this daemon.
        #[arg(long)]
        keyring: Option<PathBuf>,
        /// Bare key; a keyring entry is synthesized.
        #[arg(long, conflicts_with = "keyring")]
        key: Option<String>,
        /// Monitor address (monitors only).
        #[arg(long)]
        mon_ip: Option<String>,
        /// Monitor public network (monitors only).
        #[arg(long, conflicts_with = "mon_ip")]
        mon_network: Option<String>,
        /// Existing volume id to activate before starting (OSDs only).
        #[arg(long)]
        osd_fsid: Option<String>,
        #[arg(long, requires = "gid")]
        uid: Option<u32>,
        #[arg(long, requires = "uid")]
        gid: Option<u32>,
    },
    /// Run a daemon in the foreground without installing a unit (debug).
    Run {
        name: String,
        #[arg(long)]
        image: String,
        #[arg(long)]
        fsid: String,
    },
    /// Interactive container with a broad mount set.
    Shell {
        #[arg(long)]
        image: String,
        #[arg(long)]
        fsid: Option<String>,
        /// `<kind>.<id>` or a bare kind to pick the mount set.
        #[arg(long)]
        name: Option<String>,
        /// Mount this config file into the container.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Mount this keyring into the container.
        #[arg(long)]
        keyring: Option<PathBuf>,
    },
    /// Attach a shell inside a running daemon container.
    Enter {
        name: String,
        #[arg(long)]
        image: String,
        #[arg(long)]
        fsid: String,
    },
    /// Run a command inside a running daemon container.
    Exec {
        name: String,
        #[arg(long)]
        image: String,
        #[arg(long)]
        fsid: String,
        #[arg(long, default_value_t = false)]
        privileged: bool,
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Privileged volume-group helper (`shoal-volume`).
    Volume {
        #[arg(long)]
        image: String,
        #[arg(long)]
        fsid: String,
        /// JSON envelope with config and keyring; `-` reads stdin.
        #[arg(long)]
        config_and_keyring: Option<String>,
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Delegate a systemctl verb to one daemon's unit.
    Unit {
        name: String,
        #[arg(long)]
        fsid: String,
        /// systemctl verb: start, stop, restart, enable, disable, ...
        action: String,
    },
    /// Inventory of managed and legacy daemons on this host.
    Ls,
    /// Migrate a legacy daemon into the managed layout.
    Adopt {
        /// Daemon to adopt, as `<kind>.<id>`.
        name: String,
        #[arg(long)]
        image: String,
        /// Source installation style.
        #[arg(long, default_value = "legacy")]
        style: String,
        /// Legacy cluster label.
        #[arg(long, default_value = "shoal")]
        cluster: String,
        #[arg(long, requires = "gid")]
        uid: Option<u32>,
        #[arg(long, requires = "uid")]
        gid: Option<u32>,
    },
    /// Stop and delete one daemon.
    RmDaemon {
        name: String,
        #[arg(long)]
        fsid: String,
        /// Required for monitors and OSDs.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Delete an entire cluster identity's footprint.
    RmCluster {
        #[arg(long)]
        fsid: String,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[allow(clippy::too_many_lines)]
fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SHOALADM_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let layout = StoreLayout::new(&cli.data_dir, &cli.log_dir, &cli.unit_dir);

    // Only commands that build or run containers need an engine binary.
    let needs_engine = !matches!(
        cli.command,
        Commands::Ls
            | Commands::Unit { .. }
            | Commands::RmDaemon { .. }
            | Commands::RmCluster { .. }
            | Commands::Completions { .. }
    );
    // SHOALADM_ENGINE overrides discovery (tests point it at a stub).
    let engine_bin = match std::env::var_os("SHOALADM_ENGINE") {
        Some(path) => PathBuf::from(path),
        None if needs_engine => match find_engine(cli.docker) {
            Ok(path) => path,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(EXIT_EXTERNAL_ERROR);
            }
        },
        None => PathBuf::from("podman"),
    };
    tracing::debug!("container engine: {}", engine_bin.display());

    let json_output = cli.json;
    let new_engine = |config: RunConfig| Engine::new(config, Box::new(Systemctl));

    let result = match cli.command {
        Commands::Version { image } => {
            let engine = new_engine(RunConfig::new(image, engine_bin, layout));
            commands::version::run(&engine)
        }
        Commands::Bootstrap {
            image,
            fsid,
            mon_id,
            mgr_id,
            mon_ip,
            mon_network,
            mon_addrv,
            uid,
            gid,
            output_keyring,
            output_config,
            output_pub_ssh_key,
            skip_ssh,
            wait_interval,
            wait_attempts,
        } => {
            let mut config = RunConfig::new(image, engine_bin, layout);
            config.cluster_id = fsid;
            config.mon_id = mon_id;
            config.mgr_id = mgr_id;
            config.mon_addr = mon_addr_from(mon_ip, mon_network, mon_addrv);
            config.owner = ownership_from(uid, gid);
            config.output_keyring = output_keyring;
            config.output_config = output_config;
            config.output_pub_ssh_key = output_pub_ssh_key;
            config.skip_ssh = skip_ssh;
            config.wait_interval = Duration::from_secs(wait_interval);
            config.wait_attempts = wait_attempts;
            commands::bootstrap::run(&new_engine(config), json_output)
        }
        Commands::Deploy {
            name,
            image,
            fsid,
            config_and_keyring,
            config,
            keyring,
            key,
            mon_ip,
            mon_network,
            osd_fsid,
            uid,
            gid,
        } => {
            let mut run_config = RunConfig::new(image, engine_bin, layout);
            run_config.cluster_id = Some(fsid);
            run_config.mon_addr = mon_addr_from(mon_ip, mon_network, None);
            run_config.owner = ownership_from(uid, gid);
            commands::deploy::run(
                &new_engine(run_config),
                &name,
                config_and_keyring.as_deref(),
                config.as_deref(),
                keyring,
                key,
                osd_fsid.as_deref(),
            )
        }
        Commands::Run { name, image, fsid } => {
            let mut config = RunConfig::new(image, engine_bin, layout);
            config.cluster_id = Some(fsid);
            commands::run::run(&new_engine(config), &name)
        }
        Commands::Shell {
            image,
            fsid,
            name,
            config,
            keyring,
        } => {
            let mut run_config = RunConfig::new(image, engine_bin, layout);
            run_config.cluster_id = fsid;
            commands::shell::run(
                &new_engine(run_config),
                name.as_deref(),
                config.as_deref(),
                keyring.as_deref(),
            )
        }
        Commands::Enter { name, image, fsid } => {
            let mut config = RunConfig::new(image, engine_bin, layout);
            config.cluster_id = Some(fsid);
            commands::enter::run(&new_engine(config), &name)
        }
        Commands::Exec {
            name,
            image,
            fsid,
            privileged,
            command,
        } => {
            let mut config = RunConfig::new(image, engine_bin, layout);
            config.cluster_id = Some(fsid);
            commands::exec::run(&new_engine(config), &name, privileged, &command)
        }
        Commands::Volume {
            image,
            fsid,
            config_and_keyring,
            command,
        } => {
            let mut config = RunConfig::new(image, engine_bin, layout);
            config.cluster_id = Some(fsid);
            commands::volume::run(&new_engine(config), config_and_keyring.as_deref(), &command)
        }
        Commands::Unit { name, fsid, action } => {
            let mut config = RunConfig::new(String::new(), engine_bin, layout);
            config.cluster_id = Some(fsid);
            commands::unit::run(&new_engine(config), &name, &action)
        }
        Commands::Ls => {
            let config = RunConfig::new(String::new(), engine_bin, layout);
            commands::ls::run(&new_engine(config), json_output)
        }
        Commands::Adopt {
            name,
            image,
            style,
            cluster,
            uid,
            gid,
        } => {
            let mut config = RunConfig::new(image, engine_bin, layout);
            config.owner = ownership_from(uid, gid);
            commands::adopt::run(&new_engine(config), &name, &style, &cluster)
        }
        Commands::RmDaemon { name, fsid, force } => {
            let mut config = RunConfig::new(String::new(), engine_bin, layout);
            config.cluster_id = Some(fsid);
            commands::rm_daemon::run(&new_engine(config), &name, force)
        }
        Commands::RmCluster { fsid, force } => {
            let mut config = RunConfig::new(String::new(), engine_bin, layout);
            config.cluster_id = Some(fsid);
            commands::rm_cluster::run(&new_engine(config), force)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("schema error:")
                || msg.starts_with("refusing")
                || msg.starts_with("monitors need")
                || msg.starts_with("no keyring source")
                || msg.starts_with("no config source")
                || msg.contains("is required")
            {
                EXIT_VALIDATION_ERROR
            } else if msg.starts_with("store error:") || msg.starts_with("I/O error") {
                EXIT_STORE_ERROR
            } else if msg.starts_with("runtime error:") {
                EXIT_EXTERNAL_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn mon_addr_from(
    mon_ip: Option<String>,
    mon_network: Option<String>,
    mon_addrv: Option<String>,
) -> Option<MonAddr> {
    mon_ip
        .map(MonAddr::Addr)
        .or(mon_addrv.map(MonAddr::Addrv))
        .or(mon_network.map(MonAddr::Network))
}

fn ownership_from(uid: Option<u32>, gid: Option<u32>) -> Option<Ownership> {
    uid.zip(gid).map(|(uid, gid)| Ownership::new(uid, gid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_a_full_bootstrap_invocation() {
        let cli = Cli::try_parse_from([
            "shoaladm",
            "--data-dir",
            "/tmp/data",
            "bootstrap",
            "--image",
            "registry.example.com/shoal:v1",
            "--mon-ip",
            "10.0.0.5",
            "--skip-ssh",
            "--output-keyring",
            "/tmp/admin.keyring",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Bootstrap { skip_ssh: true, .. }
        ));
    }

    #[test]
    fn cli_rejects_conflicting_mon_flags() {
        assert!(Cli::try_parse_from([
            "shoaladm",
            "deploy",
            "mon.a",
            "--image",
            "img",
            "--fsid",
            "x",
            "--mon-ip",
            "10.0.0.5",
            "--mon-network",
            "10.0.0.0/24",
        ])
        .is_err());
    }

    #[test]
    fn cli_requires_uid_and_gid_together() {
        assert!(Cli::try_parse_from([
            "shoaladm",
            "adopt",
            "osd.3",
            "--image",
            "img",
            "--uid",
            "167",
        ])
        .is_err());
    }

    #[test]
    fn mon_addr_prefers_the_fixed_address() {
        let addr = mon_addr_from(
            Some("10.0.0.5".to_owned()),
            Some("10.0.0.0/24".to_owned()),
            None,
        )
        .unwrap();
        assert!(matches!(addr, MonAddr::Addr(_)));
        assert!(mon_addr_from(None, None, None).is_none());
    }

    #[test]
    fn ownership_needs_both_halves() {
        assert!(ownership_from(Some(167), None).is_none());
        assert_eq!(
            ownership_from(Some(167), Some(167)),
            Some(Ownership::new(167, 167))
        );
    }
}
