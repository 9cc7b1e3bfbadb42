// src/pipeline/mod.rs
//! Marker extraction and relocation.
//!
//! A run goes through five steps over the document's lines:
//!
//! 1. extract: every line matched by the registry becomes a [`Match`];
//! 2. substitute: matched lines are swapped for their placeholders;
//! 3. transform: the joined text goes through the [`Converter`];
//! 4. relocate: placeholders are found again in the converted lines;
//! 5. finalize: placeholders are swapped for each match's final text.
//!
//! Relocation relies on the converter keeping markers in their relative
//! order, which lets it find every placeholder in one forward scan.

pub mod convert;
pub mod ranges;

// --- Imports ---
use crate::markers::{Match, MarkerRegistry};
use crate::utils::debug::save_debug_snapshot;
use crate::utils::error::{ConvertError, MarkerError, PipelineError};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

pub use convert::{CommandConverter, Converter, Passthrough};

/// Line index → match, iterated in line order.
pub type MatchMap = BTreeMap<usize, Match>;

// --- Data Structures ---
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub original_lines: Vec<String>,
    /// Matches keyed by their line in the input; never modified after extraction.
    pub original_matches: MatchMap,
    /// Placeholder-substituted lines handed to the converter.
    pub working_lines: Vec<String>,
    /// Converter output, before relocation.
    pub converted_text: String,
    /// Finished lines.
    pub lines: Vec<String>,
    /// Matches keyed by their line in `lines`. Range assignment updates these in place.
    pub matches: MatchMap,
}

impl ParsedDocument {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Matches sharing `identity`, in line order.
    pub fn matches_with<'a>(
        &'a self,
        identity: Option<&'a str>,
    ) -> impl Iterator<Item = (usize, &'a Match)> + 'a {
        self.matches
            .iter()
            .filter(move |(_, m)| m.has_identity(identity))
            .map(|(line, m)| (*line, m))
    }
}

pub struct Pipeline<'r> {
    registry: &'r MarkerRegistry,
    snapshot_dir: Option<PathBuf>,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r MarkerRegistry) -> Self {
        Self {
            registry,
            snapshot_dir: None,
        }
    }

    /// Save converter input/output under `dir` on every run.
    pub fn with_snapshot_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.snapshot_dir = dir;
        self
    }

    /// Runs every step on `lines`.
    pub fn run<C>(&self, lines: Vec<String>, converter: &C) -> Result<ParsedDocument, PipelineError>
    where
        C: Converter + ?Sized,
    {
        tracing::info!("Starting marker pipeline on {} lines", lines.len());

        let matches = self.extract(&lines)?;
        let original_matches = matches.clone();
        tracing::info!("Extracted {} markers", matches.len());

        let working_lines = substitute(&lines, &matches)?;

        let converted_text = transform(&working_lines, converter)?;
        if let Some(dir) = &self.snapshot_dir {
            if let Err(e) = save_debug_snapshot(dir, &working_lines, &converted_text, &matches) {
                tracing::warn!("Failed to save debug snapshot: {}", e);
            }
        }
        let mut converted = split_lines(&converted_text);
        tracing::info!(
            "Converter '{}' returned {} lines (from {})",
            converter.name(),
            converted.len(),
            working_lines.len()
        );

        let relocated = relocate(matches, &converted)?;
        finalize(&mut converted, &relocated);
        tracing::info!("Relocated and finalized {} markers", relocated.len());

        Ok(ParsedDocument {
            original_lines: lines,
            original_matches,
            working_lines,
            converted_text,
            lines: converted,
            matches: relocated,
        })
    }

    /// One match per line: the first registry pattern that matches the line.
    pub fn extract(&self, lines: &[String]) -> Result<MatchMap, MarkerError> {
        let mut matches = MatchMap::new();

        for (number, line) in lines.iter().enumerate() {
            tracing::trace!("Scanning line {}", number);
            if let Some(mut found) = self.registry.construct(line)? {
                found.line = Some(number);
                tracing::debug!(
                    "Line {}: {} marker {} ({:?})",
                    number,
                    found.kind_name(),
                    found.uid,
                    found.identity
                );
                matches.insert(number, found);
            }
        }

        Ok(matches)
    }
}

/// Replaces every matched line by its placeholder.
///
/// Fails if an unmatched line already reads exactly like a placeholder,
/// since relocation could then latch onto the wrong line.
pub fn substitute(lines: &[String], matches: &MatchMap) -> Result<Vec<String>, PipelineError> {
    let placeholders: HashMap<&str, usize> = matches
        .iter()
        .map(|(line, m)| (m.placeholder.as_str(), *line))
        .collect();

    for (number, line) in lines.iter().enumerate() {
        if matches.contains_key(&number) {
            continue;
        }
        if placeholders.contains_key(line.as_str()) {
            return Err(PipelineError::PlaceholderCollision {
                placeholder: line.clone(),
                line: number,
            });
        }
    }

    let mut working = lines.to_vec();
    for (number, m) in matches {
        working[*number] = m.placeholder.clone();
    }
    Ok(working)
}

/// Joins, converts and hands back the converter's raw output.
pub fn transform<C>(lines: &[String], converter: &C) -> Result<String, ConvertError>
where
    C: Converter + ?Sized,
{
    converter.convert(&lines.join("\n"))
}

/// Splits on `\n` only; a trailing newline yields a trailing empty line.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

/// Finds each placeholder's line in `lines`, keeping match order.
///
/// The scan never restarts: once a placeholder is found, the search for the
/// next one continues from the following line.
pub fn relocate(matches: MatchMap, lines: &[String]) -> Result<MatchMap, PipelineError> {
    let mut pending = matches.into_values().peekable();
    let mut relocated = MatchMap::new();

    for (number, line) in lines.iter().enumerate() {
        let Some(current) = pending.peek() else {
            break;
        };
        if *line != current.placeholder {
            continue;
        }
        if let Some(found) = pending.next() {
            tracing::debug!("Marker {} moved {:?} -> {}", found.uid, found.line, number);
            relocated.insert(number, found);
        }
    }

    let unresolved: Vec<String> = pending.map(|m| m.placeholder).collect();
    if !unresolved.is_empty() {
        tracing::error!("{} marker(s) lost by the converter", unresolved.len());
        return Err(PipelineError::UnresolvedMarkers {
            placeholders: unresolved,
        });
    }

    Ok(relocated)
}

/// Writes each match's final text over its placeholder line.
pub fn finalize(lines: &mut [String], matches: &MatchMap) {
    for (number, m) in matches {
        if let Some(line) = lines.get_mut(*number) {
            *line = m.final_text.clone();
        }
    }
}
