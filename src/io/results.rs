use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::sim::shadow::ShadowResult;

/// Writes the flat per-point records of a shadow result as pretty JSON.
///
/// Each record has the fields `building_id`, `surface`, `point`, `shadow`
/// and `surface_type`.
pub fn write_results_json(path: &Path, result: &ShadowResult) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, &result.records())
        .with_context(|| format!("Failed to serialize results to: {}", path.display()))?;

    Ok(())
}
