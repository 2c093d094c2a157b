use std::io::Write;

use bibscout_core::{ResolveEvent, ResolvedRecord};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print a real-time resolution progress event.
pub fn print_event(w: &mut dyn Write, event: &ResolveEvent, color: ColorMode) -> std::io::Result<()> {
    match event {
        ResolveEvent::QueryIssued { number, query } => {
            let line = format!("query {number}: \"{query}\"");
            if color.enabled() {
                writeln!(w, "{}", line.dimmed())?;
            } else {
                writeln!(w, "{line}")?;
            }
        }
        ResolveEvent::QuerySkipped { number, .. } => {
            writeln!(w, "query {number}: skipped (too short)")?;
        }
        ResolveEvent::HitCount {
            primary_attempt,
            fallback_attempt,
            hits,
        } => {
            let hits = hits.map_or_else(|| "?".to_string(), |h| h.to_string());
            writeln!(w, "attempt {primary_attempt}+{fallback_attempt}: {hits} hits")?;
        }
        ResolveEvent::WebSearchRefined { url } => {
            writeln!(w, "web search refined the query to: {url}")?;
        }
        ResolveEvent::WebSearchEmpty => {
            let line = "web search: no result";
            if color.enabled() {
                writeln!(w, "{}", line.yellow())?;
            } else {
                writeln!(w, "{line}")?;
            }
        }
        ResolveEvent::NoMatch { candidates, hits } => {
            let line = format!("no match in {candidates} entries (of {hits})");
            if color.enabled() {
                writeln!(w, "{}", line.yellow())?;
            } else {
                writeln!(w, "{line}")?;
            }
        }
        ResolveEvent::ChallengeDetected { url } => {
            let line = format!("challenge page served; open {url} in a browser and retry later");
            if color.enabled() {
                writeln!(w, "{}", line.red())?;
            } else {
                writeln!(w, "{line}")?;
            }
        }
        ResolveEvent::FetchFailed { url, message } => {
            let line = format!("fetch failed for {url}: {message}");
            if color.enabled() {
                writeln!(w, "{}", line.red())?;
            } else {
                writeln!(w, "{line}")?;
            }
        }
    }
    Ok(())
}

/// Print the one-line acceptance summary before the record itself.
pub fn print_summary(
    w: &mut dyn Write,
    record: &ResolvedRecord,
    color: ColorMode,
) -> std::io::Result<()> {
    let c = &record.candidate;
    let year = c.year.map_or_else(String::new, |y| format!(" ({y})"));
    let line = format!(
        "resolved after {} queries: {}{year}",
        record.queries_issued, c.title
    );
    if color.enabled() {
        writeln!(w, "{}", line.green())?;
    } else {
        writeln!(w, "{line}")?;
    }
    Ok(())
}
