// src/utils/debug.rs
use crate::pipeline::MatchMap;
use crate::utils::error::AppError;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Dumps the converter's input and output plus the extracted markers into `dir`.
///
/// Written before relocation, so it is available when placeholders go missing.
pub fn save_debug_snapshot(
    dir: &Path,
    working_lines: &[String],
    converted_text: &str,
    markers: &MatchMap,
) -> Result<(), AppError> {
    fs::create_dir_all(dir)?;

    fs::write(dir.join("working.txt"), working_lines.join("\n"))?;
    fs::write(dir.join("converted.txt"), converted_text)?;

    // Original line -> packed record, in line order
    let records: BTreeMap<usize, _> = markers.iter().map(|(line, m)| (*line, m.pack())).collect();
    let json = serde_json::to_string_pretty(&records)
        .map_err(|e| AppError::Processing(format!("Could not serialize markers: {}", e)))?;
    fs::write(dir.join("markers.json"), json)?;

    tracing::info!("Saved debug snapshot to {}", dir.display());
    Ok(())
}
