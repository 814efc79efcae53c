use crate::quantity;
use crate::types::{Dims, Piece, Section, Unit};

/// Absorbs floating noise in host-reported lengths.
const LENGTH_EPSILON: f64 = 1e-6;

/// A bar whose content is final but which has no run identity yet.
#[derive(Debug, Clone)]
pub struct PackedBar<'p> {
    pub pieces: Vec<&'p Piece>,
    pub chosen_length: u32,
    pub occupied: f64,
    pub waste: f64,
    pub over_length: bool,
    pub quantity: f64,
    pub used_quantity: f64,
    /// Used quantity of each piece, in `pieces` order.
    pub piece_quantities: Vec<f64>,
    pub waste_rate: f64,
}

impl PackedBar<'_> {
    /// Share of the purchased bar attributed to each piece, proportional to
    /// its used quantity. The shares sum to `quantity`.
    pub fn purchased_shares(&self) -> Vec<f64> {
        if self.used_quantity > 0.0 {
            self.piece_quantities
                .iter()
                .map(|q| self.quantity * q / self.used_quantity)
                .collect()
        } else {
            let n = self.piece_quantities.len().max(1) as f64;
            vec![self.quantity / n; self.piece_quantities.len()]
        }
    }
}

#[derive(Debug, Clone)]
struct OpenBar<'p> {
    pieces: Vec<&'p Piece>,
    total_length: f64,
}

#[derive(Debug, Clone, Copy)]
struct ScoredFit {
    bar_idx: usize,
    slack: f64,
}

impl<'p> OpenBar<'p> {
    fn new(piece: &'p Piece) -> Self {
        Self {
            pieces: vec![piece],
            total_length: piece.length,
        }
    }

    /// One margin per internal cut.
    fn occupied(&self, margin: f64) -> f64 {
        self.total_length + margin * self.pieces.len().saturating_sub(1) as f64
    }

    fn occupied_with(&self, length: f64, margin: f64) -> f64 {
        self.total_length + length + margin * self.pieces.len() as f64
    }

    fn place(&mut self, piece: &'p Piece) {
        self.pieces.push(piece);
        self.total_length += piece.length;
    }
}

/// Best-fit-decreasing packer for one (material, section) group.
pub struct Packer<'c> {
    candidates: &'c [u32],
    margin: f64,
    unit: Unit,
}

impl<'c> Packer<'c> {
    pub fn new(candidates: &'c [u32], margin: u32, unit: Unit) -> Self {
        Self {
            candidates,
            margin: margin as f64,
            unit,
        }
    }

    /// Smallest candidate that holds `occupied`, whatever the candidate order.
    fn smallest_fit(&self, occupied: f64) -> Option<u32> {
        self.candidates
            .iter()
            .copied()
            .filter(|&l| l as f64 + LENGTH_EPSILON >= occupied)
            .min()
    }

    fn largest(&self) -> u32 {
        self.candidates.iter().copied().max().unwrap_or(0)
    }

    fn find_best(&self, bars: &[OpenBar<'_>], length: f64) -> Option<ScoredFit> {
        let mut best: Option<ScoredFit> = None;
        for (bar_idx, bar) in bars.iter().enumerate() {
            let occupied = bar.occupied_with(length, self.margin);
            if let Some(fit) = self.smallest_fit(occupied) {
                let slack = (fit as f64 - occupied).max(0.0);
                // earlier bar keeps the piece unless strictly tighter
                if best.is_none_or(|b| slack < b.slack - LENGTH_EPSILON) {
                    best = Some(ScoredFit { bar_idx, slack });
                }
            }
        }
        best
    }

    pub fn pack<'p>(&self, section: Section, pieces: &[&'p Piece]) -> Vec<PackedBar<'p>> {
        let mut sorted: Vec<&'p Piece> = pieces.to_vec();
        // stable: equal lengths keep their input order
        sorted.sort_by(|a, b| b.length.total_cmp(&a.length));

        let mut bars: Vec<OpenBar<'p>> = Vec::new();
        for piece in sorted {
            match self.find_best(&bars, piece.length) {
                Some(fit) => bars[fit.bar_idx].place(piece),
                None => bars.push(OpenBar::new(piece)),
            }
        }

        bars.into_iter().map(|bar| self.finalize(section, bar)).collect()
    }

    fn finalize<'p>(&self, section: Section, bar: OpenBar<'p>) -> PackedBar<'p> {
        let occupied = bar.occupied(self.margin);
        let (chosen_length, over_length) = match self.smallest_fit(occupied) {
            Some(l) => (l, false),
            None => (self.largest(), true),
        };
        let waste = (chosen_length as f64 - occupied).max(0.0);

        let quantity = quantity::manual(Dims::of(section, chosen_length as f64), self.unit);
        let piece_quantities: Vec<f64> = bar
            .pieces
            .iter()
            .map(|p| quantity::manual(Dims::of(section, p.length), self.unit))
            .collect();
        let used_quantity: f64 = piece_quantities.iter().sum();
        let waste_rate = if quantity > 0.0 {
            ((quantity - used_quantity) / quantity).max(0.0)
        } else {
            0.0
        };

        PackedBar {
            pieces: bar.pieces,
            chosen_length,
            occupied,
            waste,
            over_length,
            quantity,
            used_quantity,
            piece_quantities,
            waste_rate,
        }
    }
}
