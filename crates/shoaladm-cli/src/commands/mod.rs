pub mod adopt;
pub mod bootstrap;
pub mod completions;
pub mod deploy;
pub mod enter;
pub mod exec;
pub mod ls;
pub mod rm_cluster;
pub mod rm_daemon;
pub mod run;
pub mod shell;
pub mod unit;
pub mod version;
pub mod volume;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_VALIDATION_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_EXTERNAL_ERROR: u8 = 4;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Color the active/enabled columns of `ls` output.
pub fn colorize_flag(on: bool, label: &str) -> String {
    use console::Style;
    if on {
        Style::new().green().apply_to(label).to_string()
    } else {
        Style::new().dim().apply_to("-").to_string()
    }
}

/// Map a foreground child's exit code onto our own.
pub fn forward_exit(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(EXIT_FAILURE)
}

pub fn parse_name(token: &str) -> Result<shoaladm_schema::DaemonName, String> {
    token
        .parse()
        .map_err(|e: shoaladm_schema::SchemaError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes() {
        let val = serde_json::json!({"name": "mon.a"});
        let text = json_pretty(&val).unwrap();
        assert!(text.contains("\"name\""));
        assert!(text.contains("\"mon.a\""));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_VALIDATION_ERROR,
            EXIT_STORE_ERROR,
            EXIT_EXTERNAL_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn colorize_flag_prints_label_or_dash() {
        assert!(colorize_flag(true, "active").contains("active"));
        assert!(colorize_flag(false, "active").contains('-'));
    }

    #[test]
    fn forward_exit_clamps_to_u8() {
        assert_eq!(forward_exit(0), 0);
        assert_eq!(forward_exit(3), 3);
        assert_eq!(forward_exit(-1), EXIT_FAILURE);
        assert_eq!(forward_exit(300), EXIT_FAILURE);
    }

    #[test]
    fn spinner_helpers_do_not_panic() {
        let pb = spinner("working...");
        spin_ok(&pb, "done");
        let pb = spinner("working...");
        spin_fail(&pb, "failed");
    }
}
