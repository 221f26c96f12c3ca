//! Per-pool aggregation of amplicon read counts.

use crate::coverage::AmpliconRecord;
use crate::error::QcError;

pub const POOL_COUNT: usize = 12;

/// Mean `total_reads` per pool 1..=12. A pool with no records is None, not
/// zero; the distinction matters for the variability statistic and for
/// reporting. Records without a pool assignment are skipped.
pub fn pool_means(records: &[AmpliconRecord]) -> [Option<f64>; POOL_COUNT] {
    let mut sums = [0u64; POOL_COUNT];
    let mut counts = [0u32; POOL_COUNT];
    for record in records {
        let Some(pool) = record.pool else {
            continue;
        };
        if (1..=POOL_COUNT as u8).contains(&pool) {
            let slot = pool as usize - 1;
            sums[slot] += record.total_reads;
            counts[slot] += 1;
        }
    }
    std::array::from_fn(|slot| {
        (counts[slot] > 0).then(|| sums[slot] as f64 / f64::from(counts[slot]))
    })
}

/// Pool-to-pool evenness of amplification: each defined mean is expressed as
/// a percentage of the barcode's average base coverage depth, and the
/// population standard deviation of those percentages is returned. Undefined
/// pools are skipped. Lower is better.
pub fn inter_pool_variability(
    means: &[Option<f64>; POOL_COUNT],
    average_depth: f64,
) -> Result<f64, QcError> {
    if average_depth <= 0.0 {
        return Err(QcError::Shape(format!(
            "average base coverage depth must be positive, got {average_depth}"
        )));
    }
    let normalized: Vec<f64> = means
        .iter()
        .flatten()
        .map(|mean| 100.0 * mean / average_depth)
        .collect();
    Ok(population_std(&normalized))
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt()
}
