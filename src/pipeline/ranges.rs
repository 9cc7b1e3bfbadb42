// src/pipeline/ranges.rs
//! Postprocessing passes over a finished [`ParsedDocument`].
//!
//! Every pass is scoped to one identity and updates the matches stored in
//! `doc.matches` in place. They return the line keys of the matches they
//! touched.

// --- Imports ---
use crate::markers::{BoundaryRole, MatchKind};
use crate::pipeline::ParsedDocument;
use crate::utils::error::RangeError;

fn identity_label(identity: Option<&str>) -> String {
    identity.unwrap_or("<unnamed>").to_string()
}

/// Sets `[start_line, end_line)` on each section of `identity`.
///
/// A section ends where the next one of the same identity starts; the last
/// one ends at the document's line count.
pub fn assign_section_ranges(doc: &mut ParsedDocument, identity: Option<&str>) -> Vec<usize> {
    let total = doc.line_count();
    let starts: Vec<usize> = doc
        .matches_with(identity)
        .filter(|(_, m)| m.is_section())
        .map(|(line, _)| line)
        .collect();

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(total);
        if let Some(MatchKind::Section {
            start_line,
            end_line,
            ..
        }) = doc.matches.get_mut(&start).map(|m| &mut m.kind)
        {
            *start_line = Some(start);
            *end_line = Some(end);
        }
    }

    tracing::debug!("Ranged {} section(s) for {}", starts.len(), identity_label(identity));
    starts
}

/// Fills `body_text` for every ranged section of `identity`.
pub fn assign_section_bodies(
    doc: &mut ParsedDocument,
    identity: Option<&str>,
) -> Result<Vec<usize>, RangeError> {
    let ranged: Vec<(usize, usize, usize)> = doc
        .matches_with(identity)
        .filter(|(_, m)| m.is_section())
        .filter_map(|(line, m)| m.range().map(|(start, end)| (line, start, end)))
        .collect();

    if ranged.is_empty() {
        return Err(RangeError::NoSections {
            identity: identity_label(identity),
        });
    }

    for &(line, start, end) in &ranged {
        let body = doc.lines[start..end.min(doc.lines.len())].join("\n");
        if let Some(MatchKind::Section { body_text, .. }) =
            doc.matches.get_mut(&line).map(|m| &mut m.kind)
        {
            *body_text = Some(body);
        }
    }

    Ok(ranged.into_iter().map(|(line, _, _)| line).collect())
}

/// Records the final line of every collector of `identity`.
pub fn assign_collector_positions(doc: &mut ParsedDocument, identity: Option<&str>) -> Vec<usize> {
    let mut assigned = Vec::new();

    for (&line, m) in doc.matches.iter_mut() {
        if !m.has_identity(identity) {
            continue;
        }
        if let MatchKind::Collector { line_number } = &mut m.kind {
            *line_number = Some(line);
            assigned.push(line);
        }
    }

    tracing::debug!("Positioned {} collector(s) for {}", assigned.len(), identity_label(identity));
    assigned
}

/// Pairs the removal boundaries of `identity` and folds each end into its start.
///
/// Same-identity regions may not nest. The whole identity is checked before
/// anything is modified, so on error `doc` is left as it was.
pub fn assign_removal_regions(
    doc: &mut ParsedDocument,
    identity: Option<&str>,
) -> Result<Vec<usize>, RangeError> {
    let unbalanced = |line: usize, reason: String| RangeError::UnbalancedRemoval {
        identity: identity_label(identity),
        line,
        reason,
    };

    let boundaries: Vec<(usize, BoundaryRole)> = doc
        .matches_with(identity)
        .filter_map(|(line, m)| match m.kind {
            MatchKind::Removal { role, .. } => Some((line, role)),
            _ => None,
        })
        .collect();

    let mut open: Option<usize> = None;
    let mut pairs = Vec::new();
    for (line, role) in boundaries {
        match (role, open) {
            (BoundaryRole::Start, Some(previous)) => {
                return Err(unbalanced(line, format!("start at line {} is still open", previous)));
            }
            (BoundaryRole::Start, None) => open = Some(line),
            (BoundaryRole::End, None) => {
                return Err(unbalanced(line, "end without a start".to_string()));
            }
            (BoundaryRole::End, Some(start)) => {
                pairs.push((start, line));
                open = None;
            }
        }
    }
    if let Some(start) = open {
        return Err(unbalanced(start, "start is never closed".to_string()));
    }

    for &(start, end) in &pairs {
        let region = doc.lines[start..=end].join("\n");
        if let Some(MatchKind::Removal {
            start_line,
            end_line,
            region_text,
            ..
        }) = doc.matches.get_mut(&start).map(|m| &mut m.kind)
        {
            *start_line = Some(start);
            *end_line = Some(end);
            *region_text = Some(region);
        }
        doc.matches.remove(&end);
        tracing::debug!("Removal region {}..={} for {}", start, end, identity_label(identity));
    }

    Ok(pairs.into_iter().map(|(start, _)| start).collect())
}
