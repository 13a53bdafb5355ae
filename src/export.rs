// Export assembly
//
// Thin serializer for the AnonymizedExport aggregate: one users.json,
// one conversations.json, and messages/<conversation>/<date>.json per
// partition. Can target a directory or a single .zip. The core's
// contract ends at the aggregate; nothing here inspects or alters it.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::info;
use zip::write::FileOptions;

use crate::error::{PipelineError, Result};
use crate::types::AnonymizedExport;

fn to_json(value: &impl serde::Serialize) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|_| PipelineError::InvalidSource("export artifact"))
}

/// Every (relative path, body) pair the packaged export contains.
fn artifact_files(export: &AnonymizedExport) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = vec![
        ("users.json".to_string(), to_json(&export.users)?),
        ("conversations.json".to_string(), to_json(&export.conversations)?),
    ];
    for (conversation, dates) in &export.messages {
        for (date, batch) in dates {
            files.push((format!("messages/{conversation}/{date}.json"), to_json(batch)?));
        }
    }
    Ok(files)
}

/// Write the export as a plain file tree under `root`.
pub fn write_dir(export: &AnonymizedExport, root: &Path) -> Result<()> {
    for (rel, body) in artifact_files(export)? {
        let path = root.join(&rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::Io("creating the output tree", e))?;
        }
        fs::write(&path, body).map_err(|e| PipelineError::Io("writing an output file", e))?;
    }
    info!("export written as directory tree");
    Ok(())
}

/// Write the export as a single deflated .zip.
pub fn write_zip(export: &AnonymizedExport, path: &Path) -> Result<()> {
    let file =
        fs::File::create(path).map_err(|e| PipelineError::Io("creating the output archive", e))?;
    let mut writer = zip::ZipWriter::new(file);
    let options: FileOptions =
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (rel, body) in artifact_files(export)? {
        writer
            .start_file(&rel, options)
            .map_err(|_| PipelineError::InvalidSource("output archive"))?;
        writer
            .write_all(&body)
            .map_err(|e| PipelineError::Io("writing the output archive", e))?;
    }
    writer
        .finish()
        .map_err(|_| PipelineError::InvalidSource("output archive"))?;
    info!("export written as archive");
    Ok(())
}
