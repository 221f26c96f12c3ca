//! Fixed QC metric definitions and threshold evaluation.

use serde::Serialize;
use serde_json::Value;

use crate::error::QcError;

/// Direction of a threshold comparison. Both directions are boundary
/// inclusive: an observed value equal to the threshold passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    AtLeast,
    AtMost,
}

impl Comparator {
    pub fn passes(self, threshold: f64, observed: f64) -> bool {
        match self {
            Comparator::AtLeast => observed >= threshold,
            Comparator::AtMost => observed <= threshold,
        }
    }
}

/// How an observed value and its limit are rendered in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// 91.2 → "91.2%"
    PercentOfHundred,
    /// 0.923 → "92.3%"
    PercentAsIs,
    /// 512.37 → "512.4"
    OneDecimal,
    /// 41_250_000 → "41.2M"
    MillionsOneDecimal,
    /// 84.6 → "85"
    Integer,
}

impl ValueFormat {
    pub fn render(self, value: f64) -> String {
        match self {
            ValueFormat::PercentOfHundred => format!("{value:.1}%"),
            ValueFormat::PercentAsIs => format!("{:.1}%", value * 100.0),
            ValueFormat::OneDecimal => format!("{value:.1}"),
            ValueFormat::MillionsOneDecimal => format!("{:.1}M", value / 1_000_000.0),
            ValueFormat::Integer => format!("{}", value.round() as i64),
        }
    }
}

/// Declarative metric descriptor: the metric set and thresholds are fixed at
/// build time, but each row is evaluated independently from its descriptor.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub label: &'static str,
    pub threshold: f64,
    pub format: ValueFormat,
    pub comparator: Comparator,
}

impl MetricSpec {
    pub fn evaluate(&self, observed: f64) -> MetricRow {
        MetricRow {
            label: self.label.to_string(),
            value: self.format.render(observed),
            limit: self.format.render(self.threshold),
            pass: self.comparator.passes(self.threshold, observed),
        }
    }
}

/// One evaluated row of a report table.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRow {
    pub label: String,
    pub value: String,
    pub limit: String,
    pub pass: bool,
}

pub const GLOBAL_METRICS: [MetricSpec; 3] = [
    MetricSpec {
        label: "Loading",
        threshold: 80.0,
        format: ValueFormat::PercentOfHundred,
        comparator: Comparator::AtLeast,
    },
    MetricSpec {
        label: "Key signal",
        threshold: 70.0,
        format: ValueFormat::Integer,
        comparator: Comparator::AtLeast,
    },
    MetricSpec {
        label: "Mean raw accuracy",
        threshold: 98.0,
        format: ValueFormat::PercentOfHundred,
        comparator: Comparator::AtLeast,
    },
];

pub const SAMPLE_METRICS: [MetricSpec; 7] = [
    MetricSpec {
        label: "Number of mapped reads",
        threshold: 40_000_000.0,
        format: ValueFormat::MillionsOneDecimal,
        comparator: Comparator::AtLeast,
    },
    MetricSpec {
        label: "Percent reads on target",
        threshold: 90.0,
        format: ValueFormat::PercentOfHundred,
        comparator: Comparator::AtLeast,
    },
    MetricSpec {
        label: "Average base coverage depth",
        threshold: 120.0,
        format: ValueFormat::OneDecimal,
        comparator: Comparator::AtLeast,
    },
    MetricSpec {
        label: "Uniformity of base coverage",
        threshold: 90.0,
        format: ValueFormat::PercentOfHundred,
        comparator: Comparator::AtLeast,
    },
    MetricSpec {
        label: "Percent Q20 bases",
        threshold: 0.8,
        format: ValueFormat::PercentAsIs,
        comparator: Comparator::AtLeast,
    },
    MetricSpec {
        label: "Base coverage at 20x",
        threshold: 90.0,
        format: ValueFormat::PercentOfHundred,
        comparator: Comparator::AtLeast,
    },
    MetricSpec {
        label: "Inter-pool standard dev.",
        threshold: 10.0,
        format: ValueFormat::PercentOfHundred,
        comparator: Comparator::AtMost,
    },
];

/// Run-wide observed values, bound to GLOBAL_METRICS in order.
#[derive(Debug, Clone, Copy)]
pub struct GlobalObservations {
    pub loading: f64,
    pub key_signal: f64,
    pub raw_accuracy: f64,
}

impl GlobalObservations {
    pub fn rows(&self) -> Vec<MetricRow> {
        let observed = [self.loading, self.key_signal, self.raw_accuracy];
        GLOBAL_METRICS
            .iter()
            .zip(observed)
            .map(|(spec, value)| spec.evaluate(value))
            .collect()
    }
}

/// Per-sample observed values, bound to SAMPLE_METRICS in order.
#[derive(Debug, Clone, Copy)]
pub struct SampleObservations {
    pub mapped_reads: f64,
    pub percent_reads_on_target: f64,
    pub average_base_coverage_depth: f64,
    pub uniformity: f64,
    pub q20_fraction: f64,
    pub coverage_at_20x: f64,
    pub inter_pool_variability: f64,
}

impl SampleObservations {
    pub fn rows(&self) -> Vec<MetricRow> {
        let observed = [
            self.mapped_reads,
            self.percent_reads_on_target,
            self.average_base_coverage_depth,
            self.uniformity,
            self.q20_fraction,
            self.coverage_at_20x,
            self.inter_pool_variability,
        ];
        SAMPLE_METRICS
            .iter()
            .zip(observed)
            .map(|(spec, value)| spec.evaluate(value))
            .collect()
    }
}

/// Instrument-reported numbers arrive either as JSON numbers or as strings,
/// sometimes with a trailing `%`.
pub fn metric_number(value: &Value) -> Result<f64, QcError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| QcError::Parse(format!("{number} is not representable as f64"))),
        Value::String(text) => {
            let trimmed = text.trim().trim_end_matches('%').trim();
            trimmed
                .parse::<f64>()
                .map_err(|_| QcError::Parse(format!("{text:?} is not a number")))
        }
        other => Err(QcError::Parse(format!("{other} is not a number"))),
    }
}
