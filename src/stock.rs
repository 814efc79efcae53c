use crate::error::ConfigError;
use crate::types::{Priority, StockMode};

/// Commonly stocked length, always offered when a range covers it.
pub const CANONICAL_LENGTH: u32 = 7000;

/// Upper bound on the lengths a range may generate.
pub const MAX_CANDIDATES: u64 = 1000;

/// Candidate stock lengths for a material, in presentation order.
///
/// The order only matters for display: the packer always picks the
/// smallest fitting candidate, whatever its position.
pub fn candidate_lengths(mode: &StockMode) -> Result<Vec<u32>, ConfigError> {
    match mode {
        StockMode::Fixed { lengths, priority } => fixed(lengths, *priority),
        StockMode::Range { min, max, step } => range(*min, *max, *step),
    }
}

fn fixed(lengths: &[u32], priority: Priority) -> Result<Vec<u32>, ConfigError> {
    if lengths.is_empty() {
        return Err(ConfigError::EmptyLengthList);
    }
    if lengths.contains(&0) {
        return Err(ConfigError::ZeroLength);
    }

    let mut out: Vec<u32> = Vec::with_capacity(lengths.len());
    for &l in lengths {
        if !out.contains(&l) {
            out.push(l);
        }
    }
    match priority {
        Priority::Auto => {}
        Priority::SmallFirst => out.sort_unstable(),
        Priority::LargeFirst => out.sort_unstable_by(|a, b| b.cmp(a)),
    }
    Ok(out)
}

fn range(min: u32, max: u32, step: u32) -> Result<Vec<u32>, ConfigError> {
    if step == 0 {
        return Err(ConfigError::ZeroStep);
    }
    if min == 0 || min > max {
        return Err(ConfigError::InvalidRange { min, max });
    }
    let count = u64::from(max - min) / u64::from(step) + 1;
    if count > MAX_CANDIDATES {
        return Err(ConfigError::TooManyLengths {
            count,
            limit: MAX_CANDIDATES,
        });
    }

    let mut out: Vec<u32> = (min..=max).step_by(step as usize).collect();
    if (min..=max).contains(&CANONICAL_LENGTH) && !out.contains(&CANONICAL_LENGTH) {
        out.insert(0, CANONICAL_LENGTH);
    }
    Ok(out)
}
