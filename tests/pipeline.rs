use std::collections::BTreeMap;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use ampliqc::app::QcApp;
use ampliqc::domain::ReportId;
use ampliqc::error::QcError;
use ampliqc::table::render_run_summary;
use ampliqc::transport::DataService;

struct FakeService {
    json: BTreeMap<String, Value>,
    text: BTreeMap<String, String>,
}

impl DataService for FakeService {
    fn get_json(&self, rel_url: &str) -> Result<Value, QcError> {
        self.json.get(rel_url).cloned().ok_or_else(|| QcError::Status {
            url: rel_url.to_string(),
            status: 404,
            reason: "not found".to_string(),
        })
    }

    fn get_text(&self, rel_url: &str) -> Result<String, QcError> {
        self.text.get(rel_url).cloned().ok_or_else(|| QcError::Status {
            url: rel_url.to_string(),
            status: 404,
            reason: "not found".to_string(),
        })
    }
}

fn report_id() -> ReportId {
    "42".parse().unwrap()
}

/// One barcode, every pool present once with 100 reads: perfectly even
/// amplification, so the inter-pool spread is 0 whatever the depth.
fn even_coverage_table() -> String {
    let mut table = String::from("region_id\tattributes\ttotal_reads\n");
    for pool in 1..=12 {
        table.push_str(&format!("r{pool}\tGENE_ID=G{pool};Pool={pool}\t100\n"));
    }
    table
}

fn fixture() -> FakeService {
    let mut json = BTreeMap::new();
    json.insert(
        "/rundb/api/v1/results/42/".to_string(),
        json!({
            "id": 42,
            "resultsName": "Auto_run_042",
            "status": "Completed",
            "analysismetrics": "/rundb/api/v1/analysismetrics/7/",
            "eas": "/rundb/api/v1/eas/3/",
            "experiment": "/rundb/api/v1/experiment/9/",
            "libmetrics": ["/rundb/api/v1/libmetrics/5/"],
            "pluginresults": [
                "/rundb/api/v1/pluginresult/1/",
                "/rundb/api/v1/pluginresult/2/"
            ],
            "qualitymetrics": "/rundb/api/v1/qualitymetrics/4/",
            "tfmetrics": "/rundb/api/v1/tfmetrics/6/"
        }),
    );
    json.insert(
        "/rundb/api/v1/analysismetrics/7/".to_string(),
        json!({"loading": 91.2}),
    );
    json.insert(
        "/rundb/api/v1/eas/3/".to_string(),
        json!({
            "barcodedSamples": {
                "Patient A": {"barcodeSampleInfo": {"IonXpress_001": {}}}
            }
        }),
    );
    json.insert("/rundb/api/v1/experiment/9/".to_string(), json!({"expName": "R_042"}));
    json.insert(
        "/rundb/api/v1/libmetrics/5/".to_string(),
        json!({
            "aveKeyCounts": 85,
            "raw_accuracy": 98.6,
            "q20_mapped_bases": 9.2e9,
            "q7_mapped_bases": 1.0e10
        }),
    );
    json.insert(
        "/rundb/api/v1/pluginresult/1/".to_string(),
        json!({
            "pluginName": "coverageAnalysis",
            "state": "Completed",
            "URL": "/output/CoverageAnalysis_042/",
            "store": {"barcodes": {"IonXpress_001": {
                "Alignments": "IonXpress_001_rawlib",
                "Average base coverage depth": "512.4",
                "Number of mapped reads": 41_250_000,
                "Percent reads on target": "94.2%",
                "Uniformity of base coverage": "96.1%",
                "Target base coverage at 20x": "99.0%"
            }}}
        }),
    );
    json.insert(
        "/rundb/api/v1/pluginresult/2/".to_string(),
        json!({"pluginName": "variantCaller", "state": "Completed"}),
    );
    json.insert("/rundb/api/v1/qualitymetrics/4/".to_string(), json!({"q20_bases": 1}));
    json.insert("/rundb/api/v1/tfmetrics/6/".to_string(), json!({"name": "TF_1"}));

    let mut text = BTreeMap::new();
    text.insert(
        "/output/CoverageAnalysis_042/IonXpress_001/IonXpress_001_rawlib.amplicon.cov.xls"
            .to_string(),
        even_coverage_table(),
    );

    FakeService { json, text }
}

#[test]
fn even_run_passes_every_metric() {
    let app = QcApp::new(fixture());
    let summary = app.evaluate(report_id()).unwrap();

    assert_eq!(summary.report_id, 42);
    assert_eq!(summary.report_name, "Auto_run_042");
    assert_eq!(summary.global.len(), 3);
    assert!(summary.global.iter().all(|row| row.pass));

    assert_eq!(summary.samples.len(), 1);
    let sample = &summary.samples[0];
    assert_eq!(sample.sample, "Patient A");
    assert_eq!(sample.barcode, "IonXpress_001");
    assert_eq!(sample.rows.len(), 7);

    let spread = &sample.rows[6];
    assert_eq!(spread.label, "Inter-pool standard dev.");
    assert_eq!(spread.value, "0.0%");
    assert_eq!(spread.limit, "10.0%");
    assert!(spread.pass);

    assert!(sample.rows.iter().all(|row| row.pass));
}

#[test]
fn rendered_report_carries_tables_and_samples() {
    let app = QcApp::new(fixture());
    let summary = app.evaluate(report_id()).unwrap();
    let rendered = render_run_summary(&summary);

    assert!(rendered.contains("Report ID:   42"));
    assert!(rendered.contains("Report name: Auto_run_042"));
    assert!(rendered.contains("  IonXpress_001  \"Patient A\""));
    assert!(rendered.contains("Global parameters:"));
    assert!(rendered.contains("Sample parameters:"));
    assert!(rendered.contains("Pass"));
    assert!(!rendered.contains("FAIL"));
}

#[test]
fn uneven_pools_fail_the_variability_metric() {
    let mut service = fixture();
    let coverage = service
        .json
        .get_mut("/rundb/api/v1/pluginresult/1/")
        .unwrap();
    coverage["store"]["barcodes"]["IonXpress_001"]["Average base coverage depth"] =
        json!("100.0");
    let mut table = String::from("region_id\tattributes\ttotal_reads\n");
    for pool in 1..=6 {
        table.push_str(&format!("r{pool}\tPool={pool}\t40\n"));
    }
    for pool in 7..=12 {
        table.push_str(&format!("r{pool}\tPool={pool}\t160\n"));
    }
    service.text.insert(
        "/output/CoverageAnalysis_042/IonXpress_001/IonXpress_001_rawlib.amplicon.cov.xls"
            .to_string(),
        table,
    );

    let app = QcApp::new(service);
    let summary = app.evaluate(report_id()).unwrap();
    let spread = &summary.samples[0].rows[6];
    // Pools normalized to 40% and 160% of depth: population std is 60%.
    assert_eq!(spread.value, "60.0%");
    assert!(!spread.pass);
}

#[test]
fn aborts_when_report_is_not_completed() {
    let mut service = fixture();
    let root = service.json.get_mut("/rundb/api/v1/results/42/").unwrap();
    root["status"] = json!("Error");

    let app = QcApp::new(service);
    let err = app.evaluate(report_id()).unwrap_err();
    assert_matches!(err, QcError::ReportNotCompleted(status) if status == "Error");
}

#[test]
fn aborts_when_a_plugin_is_not_completed() {
    let mut service = fixture();
    service.json.insert(
        "/rundb/api/v1/pluginresult/2/".to_string(),
        json!({"pluginName": "variantCaller", "state": "Error"}),
    );

    let app = QcApp::new(service);
    let err = app.evaluate(report_id()).unwrap_err();
    assert_matches!(
        err,
        QcError::PluginNotReady { plugin, state } if plugin == "variantCaller" && state == "Error"
    );
}

#[test]
fn aborts_when_amplicon_base_path_is_unknown() {
    let mut service = fixture();
    let coverage = service
        .json
        .get_mut("/rundb/api/v1/pluginresult/1/")
        .unwrap();
    coverage.as_object_mut().unwrap().remove("URL");
    coverage["path"] = json!("/data/elsewhere/CoverageAnalysis_042");

    let app = QcApp::new(service);
    let err = app.evaluate(report_id()).unwrap_err();
    assert_matches!(err, QcError::PathResolution(_));
}

#[test]
fn aborts_on_malformed_coverage_row() {
    let mut service = fixture();
    service.text.insert(
        "/output/CoverageAnalysis_042/IonXpress_001/IonXpress_001_rawlib.amplicon.cov.xls"
            .to_string(),
        "region_id\tattributes\ttotal_reads\nr1\tPool=1\tnot-a-number\n".to_string(),
    );

    let app = QcApp::new(service);
    let err = app.evaluate(report_id()).unwrap_err();
    assert_matches!(
        err,
        QcError::Parse(message) if message.contains("IonXpress_001") && message.contains("row 1")
    );
}
