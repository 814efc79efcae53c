use crate::error::MeasureError;
use crate::providers::GeometryProvider;
use crate::types::{Dims, MeasureMethod, Piece, Unit};

const MM_PER_M: f64 = 1_000.0;
const MM2_PER_M2: f64 = 1_000_000.0;
const MM3_PER_M3: f64 = 1_000_000_000.0;

/// Converts a raw host measurement (mm, mm² or mm³) into the unit.
pub fn from_raw(value: f64, unit: Unit) -> f64 {
    match unit {
        Unit::Length => value / MM_PER_M,
        Unit::Area => value / MM2_PER_M2,
        Unit::Volume => value / MM3_PER_M3,
    }
}

/// Quantity from dimensions alone: metres of length, m² of the two largest
/// faces, or m³ of the bounding box.
pub fn manual(dims: Dims, unit: Unit) -> f64 {
    let raw = match unit {
        Unit::Length => dims.length,
        Unit::Area => {
            let mut sides = [dims.length, dims.width, dims.height];
            sides.sort_by(|a, b| b.total_cmp(a));
            sides[0] * sides[1]
        }
        Unit::Volume => dims.width * dims.height * dims.length,
    };
    from_raw(raw, unit).max(0.0)
}

pub struct QuantityCalculator<'a> {
    geometry: &'a dyn GeometryProvider,
}

impl<'a> QuantityCalculator<'a> {
    pub fn new(geometry: &'a dyn GeometryProvider) -> Self {
        Self { geometry }
    }

    /// Quantity of a piece measured with `method`. Alternate methods that
    /// cannot be satisfied degrade to the manual formula.
    pub fn measure(&self, piece: &Piece, unit: Unit, method: MeasureMethod) -> f64 {
        if method == MeasureMethod::Manual {
            return manual(piece.dims(), unit);
        }
        match self.alternate(piece, unit, method) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(
                    piece = %piece.id,
                    unit = %unit,
                    method = method.as_str(),
                    reason = %e,
                    "measurement fallback to manual"
                );
                manual(piece.dims(), unit)
            }
        }
    }

    fn alternate(&self, piece: &Piece, unit: Unit, method: MeasureMethod) -> Result<f64, MeasureError> {
        if method.unit() != Some(unit) {
            return Err(MeasureError::Unavailable {
                piece: piece.id.clone(),
                method,
            });
        }
        let value = self.geometry.measure(&piece.id, method)?;
        if value.is_nan() || value <= 0.0 {
            return Err(MeasureError::NonPositive {
                piece: piece.id.clone(),
                method,
                value,
            });
        }
        Ok(from_raw(value, unit))
    }
}
