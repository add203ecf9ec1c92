use std::collections::BTreeSet;

use csmc_core::errors::ErrorInfo;
use csmc_core::CsmcError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One labelled input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Sequence label, used verbatim as the tip label.
    pub label: String,
    /// Raw nucleotide characters.
    pub sequence: String,
}

impl SequenceRecord {
    /// Creates a record from a label and a sequence.
    pub fn new(label: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sequence: sequence.into(),
        }
    }
}

/// Validated set of equal-length sequences encoded as nucleotide state masks.
///
/// Bit 0 is A, bit 1 is C, bit 2 is G and bit 3 is T. Ambiguity codes set
/// several bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    labels: Vec<String>,
    masks: Vec<Vec<u8>>,
    sites: usize,
    digest: String,
}

impl Alignment {
    /// Validates the records and encodes every sequence.
    ///
    /// Fewer than two sequences, unequal or zero lengths, duplicate labels and
    /// non-nucleotide characters are all reported as input errors.
    pub fn new(records: Vec<SequenceRecord>) -> Result<Self, CsmcError> {
        match records.len() {
            0 => {
                return Err(CsmcError::Input(ErrorInfo::new(
                    "empty-alignment",
                    "no sequences were supplied",
                )))
            }
            1 => {
                return Err(CsmcError::Input(
                    ErrorInfo::new("single-sequence", "at least two sequences are required")
                        .with_context("label", &records[0].label),
                ))
            }
            _ => {}
        }

        let sites = records[0].sequence.len();
        if sites == 0 {
            return Err(CsmcError::Input(
                ErrorInfo::new("empty-sequence", "sequences must not be empty")
                    .with_context("label", &records[0].label),
            ));
        }

        let mut seen = BTreeSet::new();
        let mut hasher = Sha256::new();
        let mut labels = Vec::with_capacity(records.len());
        let mut masks = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            if record.sequence.len() != sites {
                return Err(CsmcError::Input(
                    ErrorInfo::new("length-mismatch", "sequence lengths do not match")
                        .with_context("label", &record.label)
                        .with_context("expected", sites.to_string())
                        .with_context("found", record.sequence.len().to_string()),
                ));
            }
            if !seen.insert(record.label.clone()) {
                return Err(CsmcError::Input(
                    ErrorInfo::new("duplicate-label", "sequence labels must be unique")
                        .with_context("label", &record.label)
                        .with_context("index", index.to_string()),
                ));
            }
            let encoded = record
                .sequence
                .bytes()
                .enumerate()
                .map(|(site, byte)| {
                    nucleotide_mask(byte).ok_or_else(|| {
                        CsmcError::Input(
                            ErrorInfo::new("invalid-character", "unrecognised nucleotide symbol")
                                .with_context("label", &record.label)
                                .with_context("site", site.to_string())
                                .with_context("symbol", char::from(byte).escape_default().to_string()),
                        )
                    })
                })
                .collect::<Result<Vec<u8>, _>>()?;
            hasher.update(record.label.as_bytes());
            hasher.update([0u8]);
            hasher.update(record.sequence.as_bytes());
            hasher.update([b'\n']);
            labels.push(record.label);
            masks.push(encoded);
        }

        Ok(Self {
            labels,
            masks,
            sites,
            digest: format!("{:x}", hasher.finalize()),
        })
    }

    /// Number of sequences (tips).
    pub fn tip_count(&self) -> usize {
        self.labels.len()
    }

    /// Number of alignment columns.
    pub fn site_count(&self) -> usize {
        self.sites
    }

    /// Tip labels in input order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// State masks of one tip, one per site.
    pub fn masks(&self, tip: usize) -> &[u8] {
        &self.masks[tip]
    }

    /// SHA-256 digest of the labelled sequences, used for provenance.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Maps a nucleotide or IUPAC ambiguity symbol to its state mask.
pub fn nucleotide_mask(symbol: u8) -> Option<u8> {
    let mask = match symbol.to_ascii_uppercase() {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' | b'U' => 0b1000,
        b'M' => 0b0011,
        b'R' => 0b0101,
        b'W' => 0b1001,
        b'S' => 0b0110,
        b'Y' => 0b1010,
        b'K' => 0b1100,
        b'V' => 0b0111,
        b'H' => 0b1011,
        b'D' => 0b1101,
        b'B' => 0b1110,
        b'N' | b'O' | b'X' | b'-' | b'?' => 0b1111,
        _ => return None,
    };
    Some(mask)
}
