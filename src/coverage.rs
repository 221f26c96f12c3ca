use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::QcError;
use crate::metrics::metric_number;
use crate::transport::DataService;

/// Web root older coverageAnalysis releases prepend to their `path` field.
const LEGACY_RESULTS_PREFIX: &str = "/results/analysis";

const COVERAGE_TABLE_SUFFIX: &str = ".amplicon.cov.xls";

/// `Pool=<n>` anchored at a field boundary of the `;`-delimited attribute
/// list. Also matches the old notation with the pool at the end of the string.
static POOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|;)\s*Pool=(\d+)\s*(?:;|$)").expect("valid pool pattern"));

/// One row of an amplicon coverage table. `pool` is None when the attribute
/// list carries no pool assignment; such rows stay in the record set but are
/// skipped by pool aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmpliconRecord {
    pub total_reads: u64,
    pub pool: Option<u8>,
}

pub fn extract_pool(attributes: &str) -> Option<u8> {
    POOL_PATTERN
        .captures(attributes)
        .and_then(|captures| captures[1].parse::<u8>().ok())
}

/// Parses a tab-delimited coverage table: first non-empty line is the header,
/// the rest are data rows, blank lines dropped. Requires the `total_reads`
/// and `attributes` columns wherever they appear in the header.
pub fn parse_coverage_table(text: &str) -> Result<Vec<AmpliconRecord>, QcError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| QcError::Parse("coverage table is empty".to_string()))?;
    let columns: Vec<&str> = header.split('\t').collect();
    let reads_column = columns
        .iter()
        .position(|name| *name == "total_reads")
        .ok_or_else(|| QcError::Shape("coverage table has no total_reads column".to_string()))?;
    let attributes_column = columns
        .iter()
        .position(|name| *name == "attributes")
        .ok_or_else(|| QcError::Shape("coverage table has no attributes column".to_string()))?;

    let mut records = Vec::new();
    for (index, line) in lines.enumerate() {
        let row = index + 1;
        let fields: Vec<&str> = line.split('\t').collect();
        let reads = fields
            .get(reads_column)
            .ok_or_else(|| QcError::Parse(format!("row {row} is missing total_reads")))?;
        let total_reads = reads.trim().parse::<u64>().map_err(|_| {
            QcError::Parse(format!("row {row}: total_reads {reads:?} is not an integer"))
        })?;
        let attributes = fields
            .get(attributes_column)
            .ok_or_else(|| QcError::Parse(format!("row {row} is missing attributes")))?;
        records.push(AmpliconRecord {
            total_reads,
            pool: extract_pool(attributes),
        });
    }
    Ok(records)
}

/// Base path of the coverageAnalysis output directory, relative to the
/// server root. The `URL` field is preferred; older plugin releases only
/// report a filesystem `path` under the legacy web root.
pub fn amplicon_base_path(result: &Value) -> Result<String, QcError> {
    if let Some(url) = result.get("URL").and_then(Value::as_str) {
        if !url.is_empty() {
            return Ok(with_trailing_slash(url));
        }
    }
    let Some(path) = result.get("path").and_then(Value::as_str) else {
        return Err(QcError::PathResolution(
            "coverage analysis result has neither URL nor path".to_string(),
        ));
    };
    match path.strip_prefix(LEGACY_RESULTS_PREFIX) {
        Some(rest) => Ok(with_trailing_slash(rest)),
        None => Err(QcError::PathResolution(format!(
            "unknown path format: {path}"
        ))),
    }
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Per-barcode values the coverageAnalysis plugin already computed and
/// stored with the run. Numbers may arrive as bare JSON numbers or as
/// strings with a trailing `%`.
#[derive(Debug, Clone)]
pub struct BarcodeSummary {
    pub alignments: String,
    pub average_base_coverage_depth: f64,
    pub mapped_reads: f64,
    pub percent_reads_on_target: f64,
    pub uniformity: f64,
    pub coverage_at_20x: f64,
}

pub fn barcode_summaries(result: &Value) -> Result<BTreeMap<String, BarcodeSummary>, QcError> {
    let barcodes = result
        .get("store")
        .and_then(|store| store.get("barcodes"))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            QcError::Shape("coverage analysis result has no store.barcodes".to_string())
        })?;

    let mut summaries = BTreeMap::new();
    for (barcode, data) in barcodes {
        let alignments = data
            .get("Alignments")
            .and_then(Value::as_str)
            .ok_or_else(|| QcError::Shape(format!("barcode {barcode} has no Alignments")))?
            .to_string();
        summaries.insert(
            barcode.clone(),
            BarcodeSummary {
                alignments,
                average_base_coverage_depth: numeric_field(
                    data,
                    barcode,
                    "Average base coverage depth",
                )?,
                mapped_reads: numeric_field(data, barcode, "Number of mapped reads")?,
                percent_reads_on_target: numeric_field(data, barcode, "Percent reads on target")?,
                uniformity: numeric_field(data, barcode, "Uniformity of base coverage")?,
                coverage_at_20x: numeric_field(data, barcode, "Target base coverage at 20x")?,
            },
        );
    }
    Ok(summaries)
}

fn numeric_field(data: &Value, barcode: &str, name: &str) -> Result<f64, QcError> {
    let value = data
        .get(name)
        .ok_or_else(|| QcError::Shape(format!("barcode {barcode} has no \"{name}\"")))?;
    metric_number(value).map_err(|err| match err {
        QcError::Parse(message) => {
            QcError::Parse(format!("barcode {barcode}, \"{name}\": {message}"))
        }
        other => other,
    })
}

/// Fetches and parses the coverage table of every barcode, in barcode order.
pub fn fetch_amplicon_tables<S: DataService>(
    service: &S,
    base_path: &str,
    summaries: &BTreeMap<String, BarcodeSummary>,
) -> Result<BTreeMap<String, Vec<AmpliconRecord>>, QcError> {
    let mut tables = BTreeMap::new();
    for (barcode, summary) in summaries {
        let rel_url = format!(
            "{base_path}{barcode}/{}{COVERAGE_TABLE_SUFFIX}",
            summary.alignments
        );
        tracing::info!(%barcode, "fetching amplicon coverage table");
        let text = service.get_text(&rel_url)?;
        let records = match parse_coverage_table(&text) {
            Ok(records) => records,
            Err(QcError::Parse(message)) => {
                return Err(QcError::Parse(format!("barcode {barcode}: {message}")));
            }
            Err(err) => return Err(err),
        };
        tables.insert(barcode.clone(), records);
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn pool_at_any_position() {
        assert_eq!(extract_pool("GENE_ID=BRCA1;Pool=7;SUBMITTED=1"), Some(7));
        assert_eq!(extract_pool("Pool=12;GENE_ID=BRCA1"), Some(12));
        assert_eq!(extract_pool("GENE_ID=BRCA1;Pool=3"), Some(3));
        assert_eq!(extract_pool("Pool=1"), Some(1));
    }

    #[test]
    fn pool_requires_field_boundary() {
        assert_eq!(extract_pool("GENE_ID=xPool=5"), None);
        assert_eq!(extract_pool("SubPool=5;GENE_ID=y"), None);
    }

    #[test]
    fn pool_absent_or_unparseable() {
        assert_eq!(extract_pool("GENE_ID=BRCA1"), None);
        assert_eq!(extract_pool(""), None);
        assert_eq!(extract_pool("Pool=999999"), None);
    }

    #[test]
    fn table_row_count_and_order() {
        let text = "region_id\tattributes\ttotal_reads\n\
                    r1\tPool=1\t100\n\
                    \n\
                    r2\tGENE_ID=X\t250\n\
                    r3\tPool=2\t50\n";
        let records = parse_coverage_table(text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            AmpliconRecord {
                total_reads: 100,
                pool: Some(1)
            }
        );
        assert_eq!(records[1].pool, None);
        assert_eq!(records[2].total_reads, 50);
    }

    #[test]
    fn table_rejects_non_integer_reads() {
        let text = "total_reads\tattributes\nabc\tPool=1\n";
        let err = parse_coverage_table(text).unwrap_err();
        assert_matches!(err, QcError::Parse(message) if message.contains("row 1"));
    }

    #[test]
    fn table_requires_columns() {
        let err = parse_coverage_table("region_id\tattributes\nr1\tPool=1\n").unwrap_err();
        assert_matches!(err, QcError::Shape(message) if message.contains("total_reads"));
    }

    #[test]
    fn base_path_prefers_url() {
        let result = json!({"URL": "/output/CoverageAnalysis_042", "path": "/results/analysis/x"});
        assert_eq!(
            amplicon_base_path(&result).unwrap(),
            "/output/CoverageAnalysis_042/"
        );
    }

    #[test]
    fn base_path_strips_legacy_prefix() {
        let result = json!({"path": "/results/analysis/output/Home/Auto_run_042"});
        assert_eq!(
            amplicon_base_path(&result).unwrap(),
            "/output/Home/Auto_run_042/"
        );
    }

    #[test]
    fn base_path_rejects_unknown_format() {
        let result = json!({"path": "/data/elsewhere"});
        let err = amplicon_base_path(&result).unwrap_err();
        assert_matches!(err, QcError::PathResolution(message) if message.contains("/data/elsewhere"));
    }

    #[test]
    fn base_path_requires_some_field() {
        let err = amplicon_base_path(&json!({"state": "Completed"})).unwrap_err();
        assert_matches!(err, QcError::PathResolution(_));
    }

    #[test]
    fn summaries_accept_percent_strings() {
        let result = json!({
            "store": {"barcodes": {"IonXpress_001": {
                "Alignments": "IonXpress_001_rawlib",
                "Average base coverage depth": "512.4",
                "Number of mapped reads": 41_250_000,
                "Percent reads on target": "94.2%",
                "Uniformity of base coverage": "96.1%",
                "Target base coverage at 20x": "99.0%"
            }}}
        });
        let summaries = barcode_summaries(&result).unwrap();
        let summary = &summaries["IonXpress_001"];
        assert_eq!(summary.alignments, "IonXpress_001_rawlib");
        assert_eq!(summary.average_base_coverage_depth, 512.4);
        assert_eq!(summary.percent_reads_on_target, 94.2);
    }
}
