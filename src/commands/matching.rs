//! Matching commands: match, normalize.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use anyhow::Result;
use serde_json::json;

use crate::config::Settings;
use crate::daemon::service::{MatchRequest, MatchService};
use crate::matching::normalize;
use crate::output::OutputControls;

/// Rank registry names against `request.name`.
pub fn find(settings: &Settings, request: &MatchRequest, output: &OutputControls) -> Result<()> {
    let service = MatchService::from_settings(settings)?;
    let response = service.run_match(request)?;

    if output.wants_json() {
        output.print(response.as_ref());
        return Ok(());
    }

    if response.results.is_empty() {
        println!(
            "No matches for {:?} at threshold {}.",
            request.name, request.threshold
        );
        return Ok(());
    }

    println!("Matches for {:?} ({}):", request.name, response.results.len());
    println!("{}", "-".repeat(60));
    for hit in &response.results {
        match (hit.token_score, hit.edit_score) {
            (Some(token), Some(edit)) => println!(
                "{:>8}  {:>6.2}  {}  (token {:.2}, edit {:.2})",
                hit.id, hit.similarity, hit.name, token, edit
            ),
            _ => println!("{:>8}  {:>6.2}  {}", hit.id, hit.similarity, hit.name),
        }
    }

    Ok(())
}

/// Print the normalized form of `text`.
pub fn normalize_text(text: &str, output: &OutputControls) -> Result<()> {
    let normalized = normalize(text);
    if output.wants_json() {
        output.print(&json!({ "text": text, "normalized": normalized }));
    } else {
        println!("{}", normalized);
    }
    Ok(())
}
