// src/render/mod.rs
//! Presentation of parsed matches.

use crate::markers::Match;
use crate::pipeline::ParsedDocument;

/// Collectors as an HTML list of their captured text, escaped.
pub fn render_collectors(collectors: &[&Match]) -> String {
    let items: Vec<String> = collectors
        .iter()
        .filter(|m| m.is_collector())
        .map(|m| format!("<li>{}</li>", html_escape::encode_text(&m.captured_text)))
        .collect();

    format!("<ul>\n{}\n</ul>", items.join("\n"))
}

/// Page content for a section: its body once ranged, else just its heading.
pub fn render_section(section: &Match) -> Option<&str> {
    if !section.is_section() {
        return None;
    }
    Some(section.assigned_text().unwrap_or(&section.final_text))
}

/// The finished lines with every paired removal region dropped.
pub fn hide_removed_regions(doc: &ParsedDocument) -> Vec<String> {
    let regions: Vec<(usize, usize)> = doc
        .matches
        .values()
        .filter(|m| m.is_removal())
        .filter_map(Match::range)
        .collect();

    doc.lines
        .iter()
        .enumerate()
        .filter(|(number, _)| !regions.iter().any(|&(start, end)| (start..=end).contains(number)))
        .map(|(_, line)| line.clone())
        .collect()
}
