//! Run identifiers.

use chrono::Utc;
use uuid::Uuid;

/// Generates a unique identifier for one suite run.
///
/// The identifier is filesystem-safe and embeds the host, the process id and
/// the start time so that scratch directories from concurrent runs on one
/// machine never collide.
#[must_use]
pub fn generate_run_id() -> String {
    let hostname = hostname::get().map_or_else(
        |_| String::from("unknown"),
        |h| h.to_string_lossy().to_string(),
    );
    let hostname: String = hostname
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();

    let pid = std::process::id();
    let timestamp = Utc::now().format("%Y%m%dT%H%M%S");
    let uuid = &Uuid::new_v4().simple().to_string()[..8];

    format!("{timestamp}-{hostname}-{pid}-{uuid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_generation() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();

        assert_ne!(id1, id2);

        let pid = std::process::id().to_string();
        assert!(id1.contains(&pid));
        assert!(!id1.contains('/'));
    }
}
