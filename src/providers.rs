//! Seams to the outside world: where pieces, prices and alternate
//! measurements come from, and where per-piece results go.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MeasureError, ProviderError};
use crate::types::{MeasureMethod, Piece, PieceAttributes, PieceId, PieceResult, Section};

/// One-shot source of the piece snapshot.
pub trait ElementProvider {
    fn pieces(&self) -> Result<Vec<Piece>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct PieceRecord {
    id: String,
    material: String,
    width: f64,
    height: f64,
    length: f64,
}

/// Reads pieces from a CSV file with `id,material,width,height,length` headers.
/// Section dimensions are rounded to whole millimetres.
pub struct CsvPieces {
    path: PathBuf,
}

impl CsvPieces {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn read<R: std::io::Read>(reader: R) -> Result<Vec<Piece>, ProviderError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut pieces = Vec::new();
        for (idx, record) in reader.deserialize::<PieceRecord>().enumerate() {
            let record = record?;
            let line = idx as u64 + 2;
            if record.material.is_empty() {
                tracing::warn!(line, piece = %record.id, "row without material skipped");
                continue;
            }
            if !record.length.is_finite() || record.length <= 0.0 {
                return Err(ProviderError::InvalidRecord {
                    line,
                    message: format!("piece {} has non-positive length {}", record.id, record.length),
                });
            }
            if !record.width.is_finite() || !record.height.is_finite() {
                return Err(ProviderError::InvalidRecord {
                    line,
                    message: format!("piece {} has a non-numeric section", record.id),
                });
            }
            if record.width < 0.0 || record.height < 0.0 {
                return Err(ProviderError::InvalidRecord {
                    line,
                    message: format!("piece {} has a negative section", record.id),
                });
            }
            pieces.push(Piece::new(
                record.id,
                record.material,
                Section::new(record.width.round() as u32, record.height.round() as u32),
                record.length,
            ));
        }
        Ok(pieces)
    }
}

impl ElementProvider for CsvPieces {
    fn pieces(&self) -> Result<Vec<Piece>, ProviderError> {
        let file = std::fs::File::open(&self.path)?;
        let pieces = Self::read(file)?;
        tracing::info!(path = %self.path.display(), count = pieces.len(), "loaded pieces");
        Ok(pieces)
    }
}

/// Unit price lookup by material name.
pub trait PricingProvider {
    fn price(&self, material: &str) -> Option<f64>;
}

impl PricingProvider for BTreeMap<String, f64> {
    fn price(&self, material: &str) -> Option<f64> {
        self.get(material).copied()
    }
}

/// Alternate measurements reported by the host for a piece. Values are in
/// millimetres, mm² or mm³ depending on the method.
pub trait GeometryProvider {
    fn measure(&self, piece: &str, method: MeasureMethod) -> Result<f64, MeasureError>;
}

/// A provider with nothing to report; every alternate method falls back.
pub struct NoMeasurements;

impl GeometryProvider for NoMeasurements {
    fn measure(&self, piece: &str, method: MeasureMethod) -> Result<f64, MeasureError> {
        Err(MeasureError::Unavailable {
            piece: piece.to_string(),
            method,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementEntry {
    pub piece_id: PieceId,
    pub method: MeasureMethod,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MeasurementTable {
    values: HashMap<(PieceId, MeasureMethod), f64>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, piece: impl Into<PieceId>, method: MeasureMethod, value: f64) {
        self.values.insert((piece.into(), method), value);
    }

    /// Reads `piece_id,method,value` rows.
    pub fn read_csv<R: std::io::Read>(reader: R) -> Result<Self, ProviderError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut table = Self::new();
        for entry in reader.deserialize::<MeasurementEntry>() {
            let entry = entry?;
            table.insert(entry.piece_id, entry.method, entry.value);
        }
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let file = std::fs::File::open(path.as_ref())?;
        let table = Self::read_csv(file)?;
        tracing::info!(path = %path.as_ref().display(), entries = table.values.len(), "loaded measurements");
        Ok(table)
    }
}

impl FromIterator<MeasurementEntry> for MeasurementTable {
    fn from_iter<I: IntoIterator<Item = MeasurementEntry>>(iter: I) -> Self {
        let mut table = Self::new();
        for entry in iter {
            table.insert(entry.piece_id, entry.method, entry.value);
        }
        table
    }
}

impl GeometryProvider for MeasurementTable {
    fn measure(&self, piece: &str, method: MeasureMethod) -> Result<f64, MeasureError> {
        self.values
            .get(&(piece.to_string(), method))
            .copied()
            .ok_or_else(|| MeasureError::Unavailable {
                piece: piece.to_string(),
                method,
            })
    }
}

/// Receives per-piece results after a run. Writes are idempotent: the last
/// write for a piece wins.
pub trait AttributeSink {
    fn write(&mut self, piece: &str, attributes: &PieceAttributes) -> Result<(), ProviderError>;
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub attributes: HashMap<PieceId, PieceAttributes>,
}

impl AttributeSink for MemorySink {
    fn write(&mut self, piece: &str, attributes: &PieceAttributes) -> Result<(), ProviderError> {
        self.attributes.insert(piece.to_string(), attributes.clone());
        Ok(())
    }
}

#[derive(Serialize)]
struct AttributeRecord<'a> {
    piece_id: &'a str,
    bar: String,
    waste_rate: &'a str,
}

/// Writes `piece_id,bar,waste_rate` rows.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn finish(mut self) -> Result<W, ProviderError> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|e| ProviderError::Io(e.into_error()))
    }
}

impl<W: Write> AttributeSink for CsvSink<W> {
    fn write(&mut self, piece: &str, attributes: &PieceAttributes) -> Result<(), ProviderError> {
        self.writer.serialize(AttributeRecord {
            piece_id: piece,
            bar: attributes.bar.to_string(),
            waste_rate: &attributes.waste_rate,
        })?;
        Ok(())
    }
}

/// Pushes every piece's attributes to the sink. Failures are logged and
/// counted; they never abort the write-back.
pub fn write_back(results: &[PieceResult], sink: &mut dyn AttributeSink) -> usize {
    let mut failures = 0;
    for result in results {
        if let Err(e) = sink.write(&result.piece_id, &result.attributes) {
            tracing::warn!(piece = %result.piece_id, error = %e, "attribute write failed");
            failures += 1;
        }
    }
    if failures > 0 {
        tracing::warn!(failures, total = results.len(), "attribute write-back incomplete");
    }
    failures
}
