use std::collections::BTreeMap;

use crate::types::{Bar, CommandKind, CommandLine, MaterialConfig, MaterialSummary};

#[derive(Debug, Default)]
struct LineTotals {
    count: usize,
    waste_rate_sum: f64,
    quantity: f64,
    unit_price: f64,
    total_price: f64,
}

#[derive(Debug)]
struct MaterialTotals {
    summary: MaterialSummary,
    /// (rate, minimum waste percent) when waste is credited.
    credit: Option<(f64, f64)>,
}

/// Append-only accumulation of bars and unoptimized quantities into
/// command lines and per-material summaries.
#[derive(Debug, Default)]
pub struct Aggregator {
    lines: BTreeMap<(String, CommandKind), LineTotals>,
    materials: BTreeMap<String, MaterialTotals>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn material(&mut self, material: &str, config: &MaterialConfig, unit_price: f64) -> &mut MaterialTotals {
        self.materials
            .entry(material.to_string())
            .or_insert_with(|| MaterialTotals {
                summary: MaterialSummary {
                    material: material.to_string(),
                    unit: config.unit,
                    optimized: config.optimize,
                    purchased: 0.0,
                    used: 0.0,
                    unit_price,
                    total_price: 0.0,
                    waste_valorization: 0.0,
                },
                credit: config
                    .waste_credit
                    .then_some((config.valorization_rate, config.min_waste_rate)),
            })
    }

    pub fn add_bars(&mut self, config: &MaterialConfig, unit_price: f64, bars: &[Bar]) {
        for bar in bars {
            let totals = self.material(&bar.material, config, unit_price);
            totals.summary.purchased += bar.quantity;
            totals.summary.used += bar.used_quantity;

            let key = (
                bar.material.clone(),
                CommandKind::Stock {
                    section: bar.section,
                    length: bar.chosen_length,
                },
            );
            let line = self.lines.entry(key).or_insert_with(|| LineTotals {
                unit_price,
                ..Default::default()
            });
            line.count += 1;
            line.waste_rate_sum += bar.waste_percent();
            line.quantity += bar.quantity;
            line.total_price += bar.price;
        }
    }

    /// Records directly measured piece quantities; nothing is wasted.
    pub fn add_unoptimized(&mut self, material: &str, config: &MaterialConfig, unit_price: f64, quantities: &[f64]) {
        let total: f64 = quantities.iter().sum();
        let totals = self.material(material, config, unit_price);
        totals.summary.purchased += total;
        totals.summary.used += total;

        let line = self
            .lines
            .entry((material.to_string(), CommandKind::NotOptimized))
            .or_insert_with(|| LineTotals {
                unit_price,
                ..Default::default()
            });
        line.count += quantities.len();
        line.quantity += total;
        line.total_price += total * unit_price;
    }

    pub fn finish(self) -> (Vec<CommandLine>, Vec<MaterialSummary>) {
        let lines = self
            .lines
            .into_iter()
            .map(|((material, kind), t)| {
                let avg_waste_rate = match kind {
                    CommandKind::Stock { .. } if t.count > 0 => t.waste_rate_sum / t.count as f64,
                    _ => 0.0,
                };
                CommandLine {
                    material,
                    kind,
                    count: t.count,
                    avg_waste_rate,
                    quantity: t.quantity,
                    unit_price: t.unit_price,
                    total_price: t.total_price,
                }
            })
            .collect();

        let summaries = self
            .materials
            .into_values()
            .map(|MaterialTotals { mut summary, credit }| {
                summary.total_price = summary.unit_price * summary.purchased;
                summary.waste_valorization = valorization(&summary, credit);
                summary
            })
            .collect();

        (lines, summaries)
    }
}

fn valorization(summary: &MaterialSummary, credit: Option<(f64, f64)>) -> f64 {
    let Some((rate, min_waste_rate)) = credit else {
        return 0.0;
    };
    if !summary.unit.supports_valorization() {
        return 0.0;
    }
    if summary.waste_rate() * 100.0 < min_waste_rate {
        return 0.0;
    }
    summary.waste_quantity() * rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Section, Unit};

    fn bar(id: u32, length: u32, quantity: f64, used: f64, unit_price: f64) -> Bar {
        Bar {
            id,
            material: "GL24".into(),
            section: Section::new(100, 200),
            pieces: vec![format!("p{}", id)],
            piece_lengths: vec![length as f64],
            chosen_length: length,
            occupied: length as f64,
            waste: 0.0,
            quantity,
            used_quantity: used,
            piece_quantities: vec![used],
            waste_rate: (quantity - used) / quantity,
            price: quantity * unit_price,
            over_length: false,
        }
    }

    #[test]
    fn test_lines_grouped_by_length() {
        let cfg = MaterialConfig::new(Unit::Volume);
        let bars = vec![
            bar(1, 13000, 0.26, 0.2, 500.0),
            bar(2, 6000, 0.12, 0.12, 500.0),
            bar(3, 13000, 0.26, 0.13, 500.0),
        ];
        let mut agg = Aggregator::new();
        agg.add_bars(&cfg, 500.0, &bars);
        let (lines, summaries) = agg.finish();

        assert_eq!(lines.len(), 2);
        let long = lines
            .iter()
            .find(|l| matches!(l.kind, CommandKind::Stock { length: 13000, .. }))
            .unwrap();
        assert_eq!(long.count, 2);
        assert!((long.quantity - 0.52).abs() < 1e-9);
        assert!((long.total_price - 260.0).abs() < 1e-9);
        let expected_avg = ((0.06 / 0.26) + 0.5) / 2.0 * 100.0;
        assert!((long.avg_waste_rate - expected_avg).abs() < 1e-9);

        let summary = &summaries[0];
        assert!((summary.purchased - 0.64).abs() < 1e-9);
        assert!((summary.used - 0.45).abs() < 1e-9);
        assert!((summary.total_price - 320.0).abs() < 1e-9);
        assert_eq!(summary.waste_valorization, 0.0);
    }

    #[test]
    fn test_valorization_applies_to_volume() {
        let cfg = MaterialConfig::new(Unit::Volume).with_waste_credit(80.0, 1.0);
        let mut agg = Aggregator::new();
        agg.add_bars(&cfg, 0.0, &[bar(1, 13000, 0.26, 0.2, 0.0)]);
        let (_, summaries) = agg.finish();
        assert!((summaries[0].waste_valorization - 0.06 * 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_valorization_respects_min_waste_rate() {
        let cfg = MaterialConfig::new(Unit::Volume).with_waste_credit(80.0, 50.0);
        let mut agg = Aggregator::new();
        agg.add_bars(&cfg, 0.0, &[bar(1, 13000, 0.26, 0.2, 0.0)]);
        let (_, summaries) = agg.finish();
        assert_eq!(summaries[0].waste_valorization, 0.0);
    }

    #[test]
    fn test_no_valorization_for_length_unit() {
        let cfg = MaterialConfig::new(Unit::Length).with_waste_credit(80.0, 0.0);
        let mut b = bar(1, 13000, 13.0, 10.0, 0.0);
        b.material = "SJ-60".into();
        let mut agg = Aggregator::new();
        agg.add_bars(&cfg, 0.0, &[b]);
        let (_, summaries) = agg.finish();
        assert_eq!(summaries[0].waste_valorization, 0.0);
    }

    #[test]
    fn test_unoptimized_line() {
        let cfg = MaterialConfig::new(Unit::Area).with_optimize(false);
        let mut agg = Aggregator::new();
        agg.add_unoptimized("OSB", &cfg, 12.0, &[3.125, 1.875]);
        let (lines, summaries) = agg.finish();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].kind, CommandKind::NotOptimized);
        assert_eq!(lines[0].count, 2);
        assert!((lines[0].quantity - 5.0).abs() < 1e-9);
        assert!((lines[0].total_price - 60.0).abs() < 1e-9);
        assert_eq!(summaries[0].purchased, summaries[0].used);
        assert!(!summaries[0].optimized);
    }
}
