//! Default configurations derived from material names.

use crate::types::{MaterialConfig, MeasureMethod, Priority, StockMode, Unit};

/// Produces the configuration used for a material that has none.
pub trait MaterialClassifier {
    fn classify(&self, material: &str) -> MaterialConfig;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Hardware,
    Panel,
    Linear,
    Timber,
}

const HARDWARE: &[&str] = &[
    "VIS", "BOULON", "CLOU", "CHEVILLE", "EQUERRE", "SABOT", "CONNECTEUR", "ACIER", "INOX", "METAL",
];
const PANELS: &[&str] = &[
    "OSB", "CONTREPLAQUE", "PANNEAU", "PLAQUE", "ISOLANT", "MDF", "AGGLOMERE", "ENVELOPPE", "PAROI",
    "ISOLATION", "BARDAGE", "MEMBRANE",
];
const LINEAR: &[&str] = &["POUTRE", "PROFILE", "CHEVRON", "TASSEAU", "SJ-", "_L", "BARRE", "TUBE", "RAIL"];

/// Engineered products only sold in 13 m bars.
const FULL_LENGTH_ONLY: &[&str] = &[
    "KVH",
    "BMR",
    "LVL",
    "SJ-60*39*200_L",
    "SJ-60*39*240_L",
    "SJ-60*39*300_L",
    "SJ-60*39*360_L",
    "SJ-60*39*400_L",
    "SJ-60*39*450_L",
    "SJ-90*39*300_L",
    "SJ-90*39*360_L",
    "SJ-90*39*400_L",
];
const FULL_LENGTH: u32 = 13000;

fn contains_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| name.contains(k))
}

/// Substring classifier over upper-cased material names.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn category(material: &str) -> Category {
        let up = material.to_uppercase();
        if contains_any(&up, HARDWARE) {
            Category::Hardware
        } else if contains_any(&up, PANELS) {
            Category::Panel
        } else if contains_any(&up, LINEAR) {
            Category::Linear
        } else {
            Category::Timber
        }
    }
}

impl MaterialClassifier for KeywordClassifier {
    fn classify(&self, material: &str) -> MaterialConfig {
        let up = material.to_uppercase();
        let mut config = match Self::category(material) {
            Category::Hardware => MaterialConfig::new(Unit::Volume).with_optimize(false),
            Category::Panel => MaterialConfig::new(Unit::Area).with_optimize(false),
            Category::Linear => MaterialConfig::new(Unit::Length),
            Category::Timber => {
                let config = MaterialConfig::new(Unit::Volume);
                let (rate, min) = (config.valorization_rate, config.min_waste_rate);
                config.with_waste_credit(rate, min)
            }
        };

        if contains_any(&up, FULL_LENGTH_ONLY) {
            config = config.with_stock(StockMode::Fixed {
                lengths: vec![FULL_LENGTH],
                priority: Priority::Auto,
            });
        }
        if up.contains("CINTR") {
            config = config.with_method(MeasureMethod::PhysicalVolume);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(KeywordClassifier::category("OSB 18mm"), Category::Panel);
        assert_eq!(KeywordClassifier::category("Chevron 60x80"), Category::Linear);
        assert_eq!(KeywordClassifier::category("Equerre 90"), Category::Hardware);
        assert_eq!(KeywordClassifier::category("GL24h"), Category::Timber);
    }

    #[test]
    fn test_panel_is_area_and_not_optimized() {
        let cfg = KeywordClassifier.classify("Panneau OSB3");
        assert_eq!(cfg.unit, Unit::Area);
        assert!(!cfg.optimize);
        assert!(!cfg.waste_credit);
    }

    #[test]
    fn test_timber_gets_waste_credit() {
        let cfg = KeywordClassifier.classify("Epicea C24");
        assert_eq!(cfg.unit, Unit::Volume);
        assert!(cfg.optimize);
        assert!(cfg.waste_credit);
        assert_eq!(cfg.stock, StockMode::default());
    }

    #[test]
    fn test_full_length_products_are_fixed() {
        let cfg = KeywordClassifier.classify("KVH 60x120");
        assert_eq!(
            cfg.stock,
            StockMode::Fixed {
                lengths: vec![13000],
                priority: Priority::Auto
            }
        );
        let cfg = KeywordClassifier.classify("SJ-60*39*300_L");
        assert_eq!(cfg.unit, Unit::Length);
        assert!(matches!(cfg.stock, StockMode::Fixed { .. }));
    }

    #[test]
    fn test_bent_timber_uses_physical_volume() {
        let cfg = KeywordClassifier.classify("Lamelle-colle cintre");
        assert_eq!(cfg.method(), MeasureMethod::PhysicalVolume);
    }
}
