use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csmc_core::errors::ErrorInfo;
use csmc_core::CsmcError;
use csmc_lik::SequenceRecord;

/// Parses FASTA text into records in file order.
///
/// The whole header line after `>` (trimmed) becomes the label. Sequence lines
/// are concatenated with all whitespace removed. Blank lines are ignored.
/// Character validation is left to [`csmc_lik::Alignment::new`].
pub fn parse_fasta(text: &str) -> Result<Vec<SequenceRecord>, CsmcError> {
    read_fasta(text.as_bytes())
}

/// Reads FASTA records from any reader.
pub fn read_fasta<R: Read>(reader: R) -> Result<Vec<SequenceRecord>, CsmcError> {
    let mut records: Vec<SequenceRecord> = Vec::new();
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(|err| {
            CsmcError::Serde(
                ErrorInfo::new("fasta-read", err.to_string())
                    .with_context("line", (index + 1).to_string()),
            )
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            let label = header.trim();
            if label.is_empty() {
                return Err(CsmcError::Input(
                    ErrorInfo::new("fasta-empty-header", "sequence header has no label")
                        .with_context("line", (index + 1).to_string()),
                ));
            }
            records.push(SequenceRecord::new(label, String::new()));
            continue;
        }
        let Some(current) = records.last_mut() else {
            return Err(CsmcError::Input(
                ErrorInfo::new("fasta-orphan-sequence", "sequence data before the first header")
                    .with_context("line", (index + 1).to_string())
                    .with_hint("FASTA records start with a '>' header line"),
            ));
        };
        current
            .sequence
            .extend(line.chars().filter(|c| !c.is_whitespace()));
    }
    tracing::debug!(records = records.len(), "parsed fasta input");
    Ok(records)
}

/// Reads FASTA records from a file.
pub fn read_fasta_file(path: &Path) -> Result<Vec<SequenceRecord>, CsmcError> {
    let file = File::open(path).map_err(|err| {
        CsmcError::Serde(
            ErrorInfo::new("fasta-open", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    read_fasta(file).map_err(|err| match err {
        CsmcError::Serde(info) => {
            CsmcError::Serde(info.with_context("path", path.display().to_string()))
        }
        other => other,
    })
}
