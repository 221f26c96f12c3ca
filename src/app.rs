use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::coverage;
use crate::domain::{ReportId, RunStatus};
use crate::error::QcError;
use crate::metrics::{self, GlobalObservations, MetricRow, SampleObservations};
use crate::plugins;
use crate::pools;
use crate::report::{self, ReportBuilder, ResolvedSection};
use crate::transport::DataService;

/// Pipeline progression. Transitions are one-way; any error aborts the run
/// from whatever stage it is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    MetadataFetched,
    SectionsResolved,
    PluginsValidated,
    AmpliconDataFetched,
    PoolStatsComputed,
    ReportEmitted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Created => "created",
            Stage::MetadataFetched => "metadata-fetched",
            Stage::SectionsResolved => "sections-resolved",
            Stage::PluginsValidated => "plugins-validated",
            Stage::AmpliconDataFetched => "amplicon-data-fetched",
            Stage::PoolStatsComputed => "pool-stats-computed",
            Stage::ReportEmitted => "report-emitted",
        };
        write!(f, "{name}")
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    *stage = next;
    tracing::debug!(stage = %next, "pipeline stage");
}

/// Everything the run evaluation produced, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub report_id: i64,
    pub report_name: String,
    pub generated_at: String,
    pub global: Vec<MetricRow>,
    pub samples: Vec<SampleReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleReport {
    pub sample: String,
    pub barcode: String,
    pub rows: Vec<MetricRow>,
}

pub struct QcApp<S: DataService> {
    service: S,
}

impl<S: DataService> QcApp<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Runs the whole pipeline once for one report id.
    pub fn evaluate(&self, report_id: ReportId) -> Result<RunSummary, QcError> {
        let mut stage = Stage::Created;
        tracing::info!(%report_id, "analysing report");

        let builder = ReportBuilder::new(&self.service);
        let root = builder.fetch_root(report_id)?;
        advance(&mut stage, Stage::MetadataFetched);
        tracing::info!(name = %root.name, status = %root.status, "retrieved run report");
        if root.status != RunStatus::Completed {
            return Err(QcError::ReportNotCompleted(root.status.to_string()));
        }

        let report = builder.resolve(root)?;
        advance(&mut stage, Stage::SectionsResolved);

        let plugin_results = report.section("pluginresults")?;
        let plugin_index = plugins::validate(plugin_results)?;
        advance(&mut stage, Stage::PluginsValidated);

        let coverage_result = plugin_index.result(plugin_results, "coverageAnalysis")?;
        let base_path = coverage::amplicon_base_path(coverage_result)?;
        let summaries = coverage::barcode_summaries(coverage_result)?;
        let tables = coverage::fetch_amplicon_tables(&self.service, &base_path, &summaries)?;
        advance(&mut stage, Stage::AmpliconDataFetched);

        let mut variability = BTreeMap::new();
        for (barcode, records) in &tables {
            let summary = &summaries[barcode];
            let means = pools::pool_means(records);
            let spread =
                pools::inter_pool_variability(&means, summary.average_base_coverage_depth)?;
            variability.insert(barcode.clone(), spread);
        }
        advance(&mut stage, Stage::PoolStatsComputed);

        let global = self.global_observations(&report)?.rows();
        let q20_fraction = self.q20_fraction(&report)?;

        let mut sample_reports = Vec::new();
        for (sample, barcode) in report::barcoded_samples(report.section("eas")?)? {
            let summary = summaries.get(&barcode).ok_or_else(|| {
                QcError::Shape(format!("barcode {barcode} has no coverage analysis entry"))
            })?;
            let spread = variability.get(&barcode).copied().ok_or_else(|| {
                QcError::Shape(format!("barcode {barcode} has no pool statistics"))
            })?;
            let observations = SampleObservations {
                mapped_reads: summary.mapped_reads,
                percent_reads_on_target: summary.percent_reads_on_target,
                average_base_coverage_depth: summary.average_base_coverage_depth,
                uniformity: summary.uniformity,
                q20_fraction,
                coverage_at_20x: summary.coverage_at_20x,
                inter_pool_variability: spread,
            };
            sample_reports.push(SampleReport {
                sample,
                barcode,
                rows: observations.rows(),
            });
        }

        let summary = RunSummary {
            report_id: report.id,
            report_name: report.name.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            global,
            samples: sample_reports,
        };
        advance(&mut stage, Stage::ReportEmitted);
        Ok(summary)
    }

    fn global_observations(
        &self,
        report: &report::RunReport,
    ) -> Result<GlobalObservations, QcError> {
        let analysis = first_entry(report.section("analysismetrics")?, "analysismetrics")?;
        let libmetrics = first_entry(report.section("libmetrics")?, "libmetrics")?;
        Ok(GlobalObservations {
            loading: numeric_field(analysis, "analysismetrics", "loading")?,
            key_signal: numeric_field(libmetrics, "libmetrics", "aveKeyCounts")?,
            raw_accuracy: numeric_field(libmetrics, "libmetrics", "raw_accuracy")?,
        })
    }

    fn q20_fraction(&self, report: &report::RunReport) -> Result<f64, QcError> {
        let libmetrics = first_entry(report.section("libmetrics")?, "libmetrics")?;
        let q20 = numeric_field(libmetrics, "libmetrics", "q20_mapped_bases")?;
        let q7 = numeric_field(libmetrics, "libmetrics", "q7_mapped_bases")?;
        if q7 <= 0.0 {
            return Err(QcError::Shape(format!(
                "q7_mapped_bases must be positive, got {q7}"
            )));
        }
        Ok(q20 / q7)
    }
}

fn first_entry<'a>(section: &'a ResolvedSection, name: &str) -> Result<&'a Value, QcError> {
    section
        .first()
        .ok_or_else(|| QcError::Shape(format!("{name} section is empty")))
}

fn numeric_field(entry: &Value, section: &str, name: &str) -> Result<f64, QcError> {
    let value = entry
        .get(name)
        .ok_or_else(|| QcError::Shape(format!("{section} entry has no {name}")))?;
    metrics::metric_number(value).map_err(|err| match err {
        QcError::Parse(message) => QcError::Parse(format!("{section}.{name}: {message}")),
        other => other,
    })
}
