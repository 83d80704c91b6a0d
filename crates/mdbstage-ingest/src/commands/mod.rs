//! Command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod extract;
pub mod list;
pub mod move_file;
pub mod remove;
pub mod run;
pub mod upload;
pub mod watch;

/// Human readable byte count (`1.5 MB`)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
