//! Temp files for net definitions

use std::io::Write;

use anyhow::Context;
use hipops::NetDef;
use tempfile::NamedTempFile;

/// Serialize `def` into a `.json` temp file that lives as long as the handle
pub fn write_net_file(def: &NetDef) -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::with_suffix(".json")
        .context("Failed to create temporary net file")?;
    serde_json::to_writer_pretty(&mut file, def).context("Failed to serialize net")?;
    file.flush().context("Failed to flush net file")?;
    Ok(file)
}

/// Write raw JSON text, for malformed-input tests
pub fn write_raw_json(text: &str) -> anyhow::Result<NamedTempFile> {
    let mut file = NamedTempFile::with_suffix(".json")
        .context("Failed to create temporary net file")?;
    file.write_all(text.as_bytes())
        .context("Failed to write net file")?;
    Ok(file)
}
