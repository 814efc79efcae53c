use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::aggregate::Aggregator;
use crate::config;
use crate::error::ConfigError;
use crate::packer::Packer;
use crate::presets::{KeywordClassifier, MaterialClassifier};
use crate::providers::{GeometryProvider, PricingProvider};
use crate::quantity::QuantityCalculator;
use crate::stock;
use crate::types::{
    Anomaly, Bar, BarRef, CommandLine, MaterialConfig, MaterialSummary, Piece, PieceAttributes,
    PieceResult, Section, Warning,
};

/// Everything one run produces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub bars: Vec<Bar>,
    pub commands: Vec<CommandLine>,
    pub summaries: Vec<MaterialSummary>,
    pub pieces: Vec<PieceResult>,
    pub anomalies: Vec<Anomaly>,
    pub warnings: Vec<Warning>,
}

impl Report {
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn total_price(&self) -> f64 {
        self.summaries.iter().map(|s| s.total_price).sum()
    }

    pub fn total_valorization(&self) -> f64 {
        self.summaries.iter().map(|s| s.waste_valorization).sum()
    }
}

/// Runs the optimization over a frozen snapshot of pieces and configs.
pub struct Optimizer<'a> {
    configs: &'a BTreeMap<String, MaterialConfig>,
    prices: &'a dyn PricingProvider,
    geometry: &'a dyn GeometryProvider,
    classifier: &'a dyn MaterialClassifier,
}

/// Per-run mutable state; bar ids run across materials.
struct RunState {
    next_bar_id: u32,
    aggregator: Aggregator,
    report: Report,
}

impl<'a> Optimizer<'a> {
    pub fn new(
        configs: &'a BTreeMap<String, MaterialConfig>,
        prices: &'a dyn PricingProvider,
        geometry: &'a dyn GeometryProvider,
    ) -> Self {
        Self {
            configs,
            prices,
            geometry,
            classifier: &KeywordClassifier,
        }
    }

    pub fn with_classifier(mut self, classifier: &'a dyn MaterialClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    fn config_for(&self, material: &str) -> Cow<'a, MaterialConfig> {
        match self.configs.get(material) {
            Some(cfg) => Cow::Borrowed(cfg),
            None => {
                tracing::debug!(material, "no configuration, using classifier default");
                Cow::Owned(self.classifier.classify(material))
            }
        }
    }

    fn unit_price(&self, material: &str) -> f64 {
        self.prices.price(material).unwrap_or_else(|| {
            tracing::warn!(material, "no unit price, using 0");
            0.0
        })
    }

    pub fn run(&self, pieces: &[Piece]) -> Report {
        let mut by_material: BTreeMap<&str, Vec<&Piece>> = BTreeMap::new();
        for piece in pieces {
            by_material.entry(piece.material.as_str()).or_default().push(piece);
        }

        let mut state = RunState {
            next_bar_id: 1,
            aggregator: Aggregator::new(),
            report: Report::default(),
        };

        for (material, group) in by_material {
            let config = self.config_for(material);
            let result = if config.optimize {
                self.optimize_material(material, &config, &group, &mut state)
            } else {
                self.measure_material(material, &config, &group, &mut state)
            };
            if let Err(e) = result {
                tracing::warn!(material, error = %e, "material skipped");
                state.report.warnings.push(Warning {
                    material: material.to_string(),
                    message: e.to_string(),
                });
            }
        }

        let RunState {
            aggregator,
            mut report,
            ..
        } = state;
        let (commands, summaries) = aggregator.finish();
        report.commands = commands;
        report.summaries = summaries;
        tracing::info!(
            pieces = pieces.len(),
            bars = report.bars.len(),
            warnings = report.warnings.len(),
            anomalies = report.anomalies.len(),
            "optimization finished"
        );
        report
    }

    fn optimize_material(
        &self,
        material: &str,
        config: &MaterialConfig,
        pieces: &[&Piece],
        state: &mut RunState,
    ) -> Result<(), ConfigError> {
        config::validate(config)?;
        let candidates = stock::candidate_lengths(&config.stock)?;
        let unit_price = self.unit_price(material);
        let packer = Packer::new(&candidates, config.cut_margin, config.unit);

        let mut by_section: BTreeMap<Section, Vec<&Piece>> = BTreeMap::new();
        for &piece in pieces {
            by_section.entry(piece.section).or_default().push(piece);
        }

        let mut bars = Vec::new();
        for (section, group) in by_section {
            for packed in packer.pack(section, &group) {
                let id = state.next_bar_id;
                state.next_bar_id += 1;

                if packed.over_length {
                    tracing::warn!(
                        material,
                        bar = id,
                        section = %section,
                        occupied = packed.occupied,
                        chosen = packed.chosen_length,
                        "pieces exceed every stock length"
                    );
                    state.report.anomalies.push(Anomaly::OverLengthPiece {
                        bar_id: id,
                        material: material.to_string(),
                        section,
                        occupied: packed.occupied,
                        chosen_length: packed.chosen_length,
                    });
                }

                let shares = packed.purchased_shares();
                let attributed = packed.pieces.iter().zip(&packed.piece_quantities).zip(shares);
                for ((piece, &used), purchased) in attributed {
                    state.report.pieces.push(PieceResult {
                        piece_id: piece.id.clone(),
                        attributes: PieceAttributes::new(BarRef::Bar(id), packed.waste_rate),
                        quantity: used,
                        purchased,
                    });
                }

                bars.push(Bar {
                    id,
                    material: material.to_string(),
                    section,
                    pieces: packed.pieces.iter().map(|p| p.id.clone()).collect(),
                    piece_lengths: packed.pieces.iter().map(|p| p.length).collect(),
                    chosen_length: packed.chosen_length,
                    occupied: packed.occupied,
                    waste: packed.waste,
                    quantity: packed.quantity,
                    used_quantity: packed.used_quantity,
                    piece_quantities: packed.piece_quantities,
                    waste_rate: packed.waste_rate,
                    price: packed.quantity * unit_price,
                    over_length: packed.over_length,
                });
            }
        }

        tracing::info!(
            material,
            unit = %config.unit,
            pieces = pieces.len(),
            bars = bars.len(),
            candidates = candidates.len(),
            "material optimized"
        );
        state.aggregator.add_bars(config, unit_price, &bars);
        state.report.bars.extend(bars);
        Ok(())
    }

    fn measure_material(
        &self,
        material: &str,
        config: &MaterialConfig,
        pieces: &[&Piece],
        state: &mut RunState,
    ) -> Result<(), ConfigError> {
        config::validate(config)?;
        let unit_price = self.unit_price(material);
        let method = config.method();
        let calculator = QuantityCalculator::new(self.geometry);

        let quantities: Vec<f64> = pieces
            .iter()
            .map(|piece| calculator.measure(piece, config.unit, method))
            .collect();
        for (piece, &quantity) in pieces.iter().zip(&quantities) {
            state.report.pieces.push(PieceResult {
                piece_id: piece.id.clone(),
                attributes: PieceAttributes::not_optimized(),
                quantity,
                purchased: quantity,
            });
        }

        tracing::info!(
            material,
            unit = %config.unit,
            method = method.as_str(),
            pieces = pieces.len(),
            "material measured without optimization"
        );
        state.aggregator.add_unoptimized(material, config, unit_price, &quantities);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MeasurementTable, NoMeasurements};
    use crate::types::{CommandKind, MeasureMethod, Priority, StockMode, Unit};
    use std::collections::HashSet;

    fn section() -> Section {
        Section::new(100, 200)
    }

    fn fixed(lengths: &[u32], priority: Priority) -> StockMode {
        StockMode::Fixed {
            lengths: lengths.to_vec(),
            priority,
        }
    }

    fn reference_pieces() -> Vec<Piece> {
        [6000.0, 4000.0, 4000.0, 3000.0]
            .iter()
            .enumerate()
            .map(|(i, &l)| Piece::new(format!("{}", i + 1), "M1", section(), l))
            .collect()
    }

    fn run(configs: &BTreeMap<String, MaterialConfig>, pieces: &[Piece]) -> Report {
        let prices: BTreeMap<String, f64> = [("M1".to_string(), 400.0)].into_iter().collect();
        Optimizer::new(configs, &prices, &NoMeasurements).run(pieces)
    }

    #[test]
    fn test_reference_run() {
        let mut configs = BTreeMap::new();
        configs.insert(
            "M1".to_string(),
            MaterialConfig::new(Unit::Volume).with_stock(fixed(&[13000], Priority::Auto)),
        );
        let report = run(&configs, &reference_pieces());

        assert_eq!(report.bar_count(), 2);
        assert_eq!(report.bars[0].id, 1);
        assert_eq!(report.bars[0].pieces, vec!["1", "2"]);
        assert_eq!(report.bars[0].waste, 2920.0);
        assert_eq!(report.bars[1].pieces, vec!["3", "4"]);
        assert_eq!(report.bars[1].waste, 5920.0);
        assert!(report.anomalies.is_empty());
        assert!(report.warnings.is_empty());

        assert_eq!(report.commands.len(), 1);
        assert_eq!(report.commands[0].count, 2);
        let summary = &report.summaries[0];
        assert!((summary.purchased - 0.52).abs() < 1e-9);
        assert!((summary.used - 0.34).abs() < 1e-9);
        assert!((summary.total_price - 0.52 * 400.0).abs() < 1e-9);

        let bars: HashSet<_> = report.pieces.iter().map(|p| p.attributes.bar).collect();
        assert_eq!(bars.len(), 2);
        assert_eq!(report.pieces.len(), 4);
    }

    #[test]
    fn test_piece_quantities_add_up_to_bars() {
        let mut configs = BTreeMap::new();
        configs.insert(
            "M1".to_string(),
            MaterialConfig::new(Unit::Volume).with_stock(fixed(&[13000], Priority::Auto)),
        );
        let report = run(&configs, &reference_pieces());

        let first = report.pieces.iter().find(|p| p.piece_id == "1").unwrap();
        // 100 x 200 x 6000 mm
        assert!((first.quantity - 0.12).abs() < 1e-9);

        for bar in &report.bars {
            let results: Vec<&PieceResult> = report
                .pieces
                .iter()
                .filter(|p| p.attributes.bar == BarRef::Bar(bar.id))
                .collect();
            assert_eq!(results.len(), bar.piece_count());
            let used: f64 = results.iter().map(|p| p.quantity).sum();
            let purchased: f64 = results.iter().map(|p| p.purchased).sum();
            assert!((used - bar.used_quantity).abs() < 1e-9);
            assert!((purchased - bar.quantity).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_material_is_isolated() {
        let mut pieces = reference_pieces();
        pieces.push(Piece::new("x1", "BAD", section(), 1000.0));
        let mut configs = BTreeMap::new();
        configs.insert(
            "M1".to_string(),
            MaterialConfig::new(Unit::Volume).with_stock(fixed(&[13000], Priority::Auto)),
        );
        configs.insert(
            "BAD".to_string(),
            MaterialConfig::new(Unit::Volume).with_stock(StockMode::Range {
                min: 2500,
                max: 13000,
                step: 0,
            }),
        );
        let report = run(&configs, &pieces);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].material, "BAD");
        assert_eq!(report.bar_count(), 2);
        assert_eq!(report.summaries.len(), 1);
        assert!(report.pieces.iter().all(|p| p.piece_id != "x1"));
    }

    #[test]
    fn test_bar_ids_continue_across_materials() {
        let mut pieces = reference_pieces();
        pieces.push(Piece::new("a", "M0", section(), 1000.0));
        let mut configs = BTreeMap::new();
        for name in ["M0", "M1"] {
            configs.insert(
                name.to_string(),
                MaterialConfig::new(Unit::Volume).with_stock(fixed(&[13000], Priority::Auto)),
            );
        }
        let report = run(&configs, &pieces);
        let ids: Vec<u32> = report.bars.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(report.bars[0].material, "M0");
    }

    #[test]
    fn test_sections_packed_separately() {
        let pieces = vec![
            Piece::new("1", "M1", Section::new(100, 200), 3000.0),
            Piece::new("2", "M1", Section::new(60, 120), 3000.0),
        ];
        let mut configs = BTreeMap::new();
        configs.insert(
            "M1".to_string(),
            MaterialConfig::new(Unit::Length).with_stock(fixed(&[13000], Priority::Auto)),
        );
        let report = run(&configs, &pieces);
        assert_eq!(report.bar_count(), 2);
        assert_ne!(report.bars[0].section, report.bars[1].section);
        assert_eq!(report.summaries[0].waste_valorization, 0.0);
    }

    #[test]
    fn test_priority_does_not_change_packing() {
        let pieces: Vec<Piece> = [3900.0, 2500.0, 1200.0, 5200.0, 800.0, 3000.0]
            .iter()
            .enumerate()
            .map(|(i, &l)| Piece::new(format!("{}", i), "M1", section(), l))
            .collect();
        let lengths = [4000, 6000, 13000];
        let outcome = |priority| {
            let mut configs = BTreeMap::new();
            configs.insert(
                "M1".to_string(),
                MaterialConfig::new(Unit::Volume).with_stock(fixed(&lengths, priority)),
            );
            let report = run(&configs, &pieces);
            report
                .bars
                .iter()
                .map(|b| (b.pieces.clone(), b.chosen_length))
                .collect::<Vec<_>>()
        };
        assert_eq!(outcome(Priority::LargeFirst), outcome(Priority::SmallFirst));
    }

    #[test]
    fn test_not_optimized_material() {
        let pieces = vec![
            Piece::new("1", "OSB", Section::new(18, 1250), 2500.0),
            Piece::new("2", "OSB", Section::new(18, 1250), 1500.0),
        ];
        let mut table = MeasurementTable::new();
        table.insert("2", MeasureMethod::ReferenceFaceArea, 2_000_000.0);
        let mut configs = BTreeMap::new();
        configs.insert(
            "OSB".to_string(),
            MaterialConfig::new(Unit::Area)
                .with_optimize(false)
                .with_method(MeasureMethod::ReferenceFaceArea),
        );
        let prices: BTreeMap<String, f64> = [("OSB".to_string(), 10.0)].into_iter().collect();
        let report = Optimizer::new(&configs, &prices, &table).run(&pieces);

        assert!(report.bars.is_empty());
        assert_eq!(report.commands.len(), 1);
        assert_eq!(report.commands[0].kind, CommandKind::NotOptimized);
        assert_eq!(report.commands[0].count, 2);
        // 3.125 manual fallback + 2.0 measured
        assert!((report.commands[0].quantity - 5.125).abs() < 1e-9);
        let summary = &report.summaries[0];
        assert_eq!(summary.purchased, summary.used);
        assert!((summary.total_price - 51.25).abs() < 1e-9);
        assert!(report
            .pieces
            .iter()
            .all(|p| p.attributes.bar == BarRef::NotOptimized && p.attributes.waste_rate == "0.00 %"));
        let measured = report.pieces.iter().find(|p| p.piece_id == "2").unwrap();
        assert!((measured.quantity - 2.0).abs() < 1e-9);
        assert_eq!(measured.purchased, measured.quantity);
    }

    #[test]
    fn test_over_length_reported() {
        let pieces = vec![Piece::new("long", "M1", section(), 14500.0)];
        let mut configs = BTreeMap::new();
        configs.insert(
            "M1".to_string(),
            MaterialConfig::new(Unit::Volume).with_stock(fixed(&[6000, 13000], Priority::Auto)),
        );
        let report = run(&configs, &pieces);
        assert_eq!(report.anomalies.len(), 1);
        assert!(matches!(
            report.anomalies[0],
            Anomaly::OverLengthPiece { bar_id: 1, chosen_length: 13000, .. }
        ));
        assert_eq!(report.bars[0].waste, 0.0);
    }

    #[test]
    fn test_unconfigured_material_uses_classifier() {
        let pieces = vec![Piece::new("1", "Panneau OSB", Section::new(18, 1250), 2500.0)];
        let configs = BTreeMap::new();
        let report = run(&configs, &pieces);
        assert!(report.bars.is_empty());
        assert!(!report.summaries[0].optimized);
        assert_eq!(report.summaries[0].unit, Unit::Area);
        assert_eq!(report.summaries[0].unit_price, 0.0);
    }

    #[test]
    fn test_identical_runs() {
        let mut configs = BTreeMap::new();
        configs.insert("M1".to_string(), MaterialConfig::new(Unit::Volume));
        let pieces = reference_pieces();
        let a = run(&configs, &pieces);
        let b = run(&configs, &pieces);
        assert_eq!(a.bars, b.bars);
        assert_eq!(a.commands, b.commands);
        assert_eq!(a.summaries, b.summaries);
    }
}
