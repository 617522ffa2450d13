//! Shared helpers for the sheeptest subcommands.

use sheepdog_harness::{Harness, HarnessError};

/// Binary size suffixes accepted and printed by sheeptest.
const UNITS: [(char, u64); 4] = [('K', 1 << 10), ('M', 1 << 20), ('G', 1 << 30), ('T', 1 << 40)];

/// Human-readable size using the largest unit that fits, e.g. "4.0 MB".
pub fn format_size(bytes: u64) -> String {
    match UNITS.iter().rev().find(|(_, scale)| bytes >= *scale) {
        Some((unit, scale)) => format!("{:.1} {}B", bytes as f64 / *scale as f64, unit),
        None => format!("{} B", bytes),
    }
}

/// Parse a byte count with an optional K/M/G/T suffix (case-insensitive).
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let Some(last) = s.chars().last() else {
        return Err("empty size string".to_string());
    };
    let (digits, scale) = match UNITS.iter().find(|(unit, _)| *unit == last.to_ascii_uppercase()) {
        Some((_, scale)) => (&s[..s.len() - 1], *scale),
        None => (s, 1),
    };
    let n: u64 = digits
        .parse()
        .map_err(|e| format!("invalid size '{}': {}", s, e))?;
    n.checked_mul(scale)
        .ok_or_else(|| format!("size '{}' overflows u64", s))
}

/// Harness for the real cluster, configured from the environment.
pub fn harness() -> Harness {
    Harness::from_env()
}

/// Unwrap a harness result or exit with its error chain.
pub fn check<T>(what: &str, result: Result<T, HarnessError>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            let mut msg = format!("{}: {}", what, e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                msg.push_str(&format!(": {}", cause));
                source = cause.source();
            }
            exit_error(&msg)
        }
    }
}

/// Print an error message and exit.
pub fn exit_error(msg: &str) -> ! {
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}
