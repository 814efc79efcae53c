//! CSV rendition of a run: purchase commands, bar details, per-piece
//! quantities and the per-material summary.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::ProviderError;
use crate::solver::Report;
use crate::types::{Bar, CommandKind, CommandLine, MaterialSummary, PieceResult, Section};

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CommandRow {
    pub material: String,
    pub width: String,
    pub height: String,
    pub lengths: String,
    pub bar_count: usize,
    pub waste_percent: f64,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Serialize)]
struct BarRow<'a> {
    bar_id: u32,
    material: &'a str,
    width: u32,
    height: u32,
    length: u32,
    piece_count: usize,
    pieces: String,
    waste: f64,
    waste_percent: f64,
    quantity: f64,
    price: f64,
}

#[derive(Debug, Serialize)]
struct PieceRow<'a> {
    piece_id: &'a str,
    bar: String,
    waste_rate: &'a str,
    quantity: f64,
    purchased: f64,
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    material: &'a str,
    unit: &'static str,
    purchased: f64,
    used: f64,
    unit_price: f64,
    total_price: f64,
    waste_percent: f64,
    optimized: &'static str,
    waste_valorization: f64,
}

/// Collapses command lines of one (material, section) into a single row
/// with a length breakdown such as `4000mm x1 | 13000mm x2`.
pub fn command_rows(lines: &[CommandLine]) -> Vec<CommandRow> {
    struct Group<'a> {
        material: &'a str,
        section: Option<Section>,
        lengths: Vec<(u32, usize)>,
        count: usize,
        waste_sum: f64,
        quantity: f64,
        unit_price: f64,
        total_price: f64,
    }

    let mut groups: Vec<Group<'_>> = Vec::new();
    for line in lines {
        let (section, length) = match line.kind {
            CommandKind::Stock { section, length } => (Some(section), Some(length)),
            CommandKind::NotOptimized => (None, None),
        };
        let same = groups
            .last()
            .is_some_and(|g| g.material == line.material && g.section == section && section.is_some());
        if !same {
            groups.push(Group {
                material: &line.material,
                section,
                lengths: Vec::new(),
                count: 0,
                waste_sum: 0.0,
                quantity: 0.0,
                unit_price: line.unit_price,
                total_price: 0.0,
            });
        }
        if let Some(group) = groups.last_mut() {
            if let Some(length) = length {
                group.lengths.push((length, line.count));
            }
            group.count += line.count;
            group.waste_sum += line.avg_waste_rate * line.count as f64;
            group.quantity += line.quantity;
            group.total_price += line.total_price;
        }
    }

    groups
        .into_iter()
        .map(|g| {
            let (width, height, lengths) = match g.section {
                Some(s) => (
                    s.width.to_string(),
                    s.height.to_string(),
                    g.lengths
                        .iter()
                        .map(|(l, n)| format!("{}mm x{}", l, n))
                        .collect::<Vec<_>>()
                        .join(" | "),
                ),
                None => ("N/A".into(), "N/A".into(), CommandKind::NotOptimized.to_string()),
            };
            let waste_percent = if g.section.is_some() && g.count > 0 {
                g.waste_sum / g.count as f64
            } else {
                0.0
            };
            CommandRow {
                material: g.material.to_string(),
                width,
                height,
                lengths,
                bar_count: g.count,
                waste_percent: round_to(waste_percent, 2),
                quantity: round_to(g.quantity, 4),
                unit_price: round_to(g.unit_price, 2),
                total_price: round_to(g.total_price, 2),
            }
        })
        .collect()
}

pub fn write_commands<W: Write>(writer: W, lines: &[CommandLine]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in command_rows(lines) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_bars<W: Write>(writer: W, bars: &[Bar]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for bar in bars {
        wtr.serialize(BarRow {
            bar_id: bar.id,
            material: &bar.material,
            width: bar.section.width,
            height: bar.section.height,
            length: bar.chosen_length,
            piece_count: bar.piece_count(),
            pieces: bar.pieces.join(" | "),
            waste: bar.waste.round(),
            waste_percent: round_to(bar.waste_percent(), 2),
            quantity: round_to(bar.quantity, 4),
            price: round_to(bar.price, 2),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_pieces<W: Write>(writer: W, pieces: &[PieceResult]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for p in pieces {
        wtr.serialize(PieceRow {
            piece_id: &p.piece_id,
            bar: p.attributes.bar.to_string(),
            waste_rate: &p.attributes.waste_rate,
            quantity: round_to(p.quantity, 6),
            purchased: round_to(p.purchased, 6),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_summary<W: Write>(writer: W, summaries: &[MaterialSummary]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for s in summaries {
        wtr.serialize(SummaryRow {
            material: &s.material,
            unit: s.unit.as_str(),
            purchased: round_to(s.purchased, 4),
            used: round_to(s.used, 4),
            unit_price: round_to(s.unit_price, 2),
            total_price: round_to(s.total_price, 2),
            waste_percent: round_to(s.waste_rate() * 100.0, 2),
            optimized: if s.optimized { "yes" } else { "no" },
            waste_valorization: round_to(s.waste_valorization, 2),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes `commands.csv`, `bars.csv`, `pieces.csv` and `summary.csv` into `dir`.
pub fn export_dir(dir: &Path, report: &Report) -> Result<(), ProviderError> {
    std::fs::create_dir_all(dir)?;
    write_commands(std::fs::File::create(dir.join("commands.csv"))?, &report.commands)?;
    write_bars(std::fs::File::create(dir.join("bars.csv"))?, &report.bars)?;
    write_pieces(std::fs::File::create(dir.join("pieces.csv"))?, &report.pieces)?;
    write_summary(std::fs::File::create(dir.join("summary.csv"))?, &report.summaries)?;
    tracing::info!(dir = %dir.display(), "exported results");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BarRef, PieceAttributes, Unit};

    fn line(material: &str, kind: CommandKind, count: usize, waste: f64) -> CommandLine {
        CommandLine {
            material: material.into(),
            kind,
            count,
            avg_waste_rate: waste,
            quantity: count as f64 * 0.1,
            unit_price: 100.0,
            total_price: count as f64 * 10.0,
        }
    }

    #[test]
    fn test_command_rows_group_lengths() {
        let section = Section::new(60, 120);
        let lines = vec![
            line("KVH", CommandKind::Stock { section, length: 4000 }, 1, 10.0),
            line("KVH", CommandKind::Stock { section, length: 13000 }, 2, 40.0),
            line(
                "KVH",
                CommandKind::Stock {
                    section: Section::new(80, 200),
                    length: 13000,
                },
                1,
                5.0,
            ),
            line("OSB", CommandKind::NotOptimized, 7, 0.0),
        ];
        let rows = command_rows(&lines);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].lengths, "4000mm x1 | 13000mm x2");
        assert_eq!(rows[0].bar_count, 3);
        assert_eq!(rows[0].waste_percent, 30.0);
        assert_eq!(rows[0].total_price, 30.0);
        assert_eq!(rows[1].width, "80");
        assert_eq!(rows[2].width, "N/A");
        assert_eq!(rows[2].lengths, "NOT OPTIMIZED");
        assert_eq!(rows[2].bar_count, 7);
    }

    #[test]
    fn test_write_summary_header() {
        let summaries = vec![MaterialSummary {
            material: "GL24".into(),
            unit: Unit::Volume,
            optimized: true,
            purchased: 0.52,
            used: 0.34,
            unit_price: 400.0,
            total_price: 208.0,
            waste_valorization: 14.4,
        }];
        let mut out = Vec::new();
        write_summary(&mut out, &summaries).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("material,unit,purchased,used,unit_price,total_price,waste_percent,optimized,waste_valorization")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("GL24,m3,0.52,0.34,"));
        assert!(row.contains(",34.62,yes,"));
    }

    #[test]
    fn test_write_pieces_quantities() {
        let pieces = vec![PieceResult {
            piece_id: "a".into(),
            attributes: PieceAttributes::new(BarRef::Bar(1), 0.25),
            quantity: 0.12,
            purchased: 0.16,
        }];
        let mut out = Vec::new();
        write_pieces(&mut out, &pieces).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "piece_id,bar,waste_rate,quantity,purchased\na,1,25.00 %,0.12,0.16\n");
    }

    #[test]
    fn test_export_dir_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        export_dir(dir.path(), &Report::default()).unwrap();
        for name in ["commands.csv", "bars.csv", "pieces.csv", "summary.csv"] {
            assert!(dir.path().join(name).exists());
        }
    }
}
