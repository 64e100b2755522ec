use tracing::debug;

use crate::domain::{Destination, TelegramCredentials};

/// Destinations participating in a publish run.
///
/// Only active destinations take part. With none active, complete legacy
/// credentials yield exactly one ephemeral `legacy` destination for this run.
pub fn resolve_destinations(
    all: &[Destination],
    legacy: Option<&TelegramCredentials>,
) -> Vec<Destination> {
    let active: Vec<Destination> = all.iter().filter(|d| d.is_active).cloned().collect();
    if !active.is_empty() {
        return active;
    }

    match legacy.filter(|c| c.is_complete()) {
        Some(creds) => {
            debug!("no active destinations; using legacy Telegram credentials");
            vec![Destination::legacy(creds.clone())]
        }
        None => Vec::new(),
    }
}
