use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::{ReportId, RunStatus};
use crate::error::QcError;
use crate::transport::DataService;

/// Sub-resources of the root report document, in resolution order.
pub const SECTION_NAMES: [&str; 7] = [
    "analysismetrics",
    "eas",
    "experiment",
    "libmetrics",
    "pluginresults",
    "qualitymetrics",
    "tfmetrics",
];

/// How a section references its remote content in the root document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionRef {
    Single(String),
    List(Vec<String>),
    Map(Vec<(String, String)>),
}

impl SectionRef {
    pub fn classify(section: &str, raw: &Value) -> Result<Self, QcError> {
        match raw {
            Value::String(url) => Ok(SectionRef::Single(url.clone())),
            Value::Array(items) => {
                let mut urls = Vec::with_capacity(items.len());
                for (position, item) in items.iter().enumerate() {
                    let url = item.as_str().ok_or_else(|| {
                        QcError::Shape(format!(
                            "section {section} entry {position} is not a URL string"
                        ))
                    })?;
                    urls.push(url.to_string());
                }
                Ok(SectionRef::List(urls))
            }
            Value::Object(map) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (key, item) in map {
                    let url = item.as_str().ok_or_else(|| {
                        QcError::Shape(format!(
                            "section {section} entry {key} is not a URL string"
                        ))
                    })?;
                    pairs.push((key.clone(), url.to_string()));
                }
                Ok(SectionRef::Map(pairs))
            }
            other => Err(QcError::Shape(format!(
                "section {section} has unsupported reference type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SectionEntry {
    pub key: String,
    pub value: Value,
}

/// One resolved section: entries in reference order plus the diagnostics of
/// any entry whose fetch failed. A failed entry does not stop its siblings;
/// consumers of the section decide whether the gap is fatal.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSection {
    entries: Vec<SectionEntry>,
    pub failures: Vec<String>,
}

impl ResolvedSection {
    pub fn push_entry(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push(SectionEntry {
            key: key.into(),
            value,
        });
    }

    pub fn first(&self) -> Option<&Value> {
        self.entries.first().map(|entry| &entry.value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Root report metadata, known before any section is resolved.
#[derive(Debug, Clone)]
pub struct RootDocument {
    pub id: i64,
    pub name: String,
    pub status: RunStatus,
    raw: Value,
}

/// Fully resolved run report. Immutable once built.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub id: i64,
    pub name: String,
    pub status: RunStatus,
    sections: BTreeMap<String, ResolvedSection>,
}

impl RunReport {
    pub fn section(&self, name: &str) -> Result<&ResolvedSection, QcError> {
        self.sections
            .get(name)
            .ok_or_else(|| QcError::Shape(format!("section {name} was not resolved")))
    }
}

pub struct ReportBuilder<'a, S: DataService> {
    service: &'a S,
}

impl<'a, S: DataService> ReportBuilder<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    pub fn fetch_root(&self, report_id: ReportId) -> Result<RootDocument, QcError> {
        let rel_url = format!("/rundb/api/v1/results/{report_id}/");
        let raw = self.service.get_json(&rel_url)?;
        let id = raw
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| QcError::Shape("report document has no numeric id".to_string()))?;
        let name = raw
            .get("resultsName")
            .and_then(Value::as_str)
            .ok_or_else(|| QcError::Shape("report document has no resultsName".to_string()))?
            .to_string();
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .map(RunStatus::parse)
            .ok_or_else(|| QcError::Shape("report document has no status".to_string()))?;
        Ok(RootDocument {
            id,
            name,
            status,
            raw,
        })
    }

    /// Resolves every named section, then freezes the report. Shape problems
    /// are collected across the whole pass so one malformed section does not
    /// hide diagnostics for the others, but any problem aborts the build.
    pub fn resolve(&self, root: RootDocument) -> Result<RunReport, QcError> {
        let mut sections = BTreeMap::new();
        let mut problems = Vec::new();

        for name in SECTION_NAMES {
            let Some(raw) = root.raw.get(name) else {
                problems.push(format!("section {name} is missing from the report"));
                continue;
            };
            match SectionRef::classify(name, raw) {
                Ok(reference) => {
                    sections.insert(name.to_string(), self.resolve_section(reference));
                }
                Err(err) => problems.push(err.to_string()),
            }
        }

        if !problems.is_empty() {
            return Err(QcError::Shape(problems.join("; ")));
        }

        Ok(RunReport {
            id: root.id,
            name: root.name,
            status: root.status,
            sections,
        })
    }

    fn resolve_section(&self, reference: SectionRef) -> ResolvedSection {
        let mut section = ResolvedSection::default();
        match reference {
            SectionRef::Single(url) => self.resolve_entry(&mut section, "0".to_string(), &url),
            SectionRef::List(urls) => {
                for (position, url) in urls.iter().enumerate() {
                    self.resolve_entry(&mut section, position.to_string(), url);
                }
            }
            SectionRef::Map(pairs) => {
                for (key, url) in &pairs {
                    self.resolve_entry(&mut section, key.clone(), url);
                }
            }
        }
        section
    }

    fn resolve_entry(&self, section: &mut ResolvedSection, key: String, url: &str) {
        match self.service.get_json(url) {
            Ok(value) => section.push_entry(key, value),
            Err(err) => {
                tracing::warn!(%key, %url, error = %err, "section entry failed to resolve");
                section.failures.push(format!("entry {key} ({url}): {err}"));
            }
        }
    }
}

/// Sample name → barcode pairs from the `eas` section. A sample spanning
/// more than one barcode is rejected rather than silently joined.
pub fn barcoded_samples(eas: &ResolvedSection) -> Result<Vec<(String, String)>, QcError> {
    let first = eas
        .first()
        .ok_or_else(|| QcError::Shape("eas section is empty".to_string()))?;
    let samples = first
        .get("barcodedSamples")
        .and_then(Value::as_object)
        .ok_or_else(|| QcError::Shape("eas entry has no barcodedSamples".to_string()))?;

    let mut out = Vec::with_capacity(samples.len());
    for (sample, data) in samples {
        let info = data
            .get("barcodeSampleInfo")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                QcError::Shape(format!("sample {sample} has no barcodeSampleInfo"))
            })?;
        let mut barcodes = info.keys();
        let Some(barcode) = barcodes.next() else {
            return Err(QcError::Shape(format!("sample {sample} has no barcode")));
        };
        if barcodes.next().is_some() {
            return Err(QcError::MultiBarcodeSample(sample.clone()));
        }
        out.push((sample.clone(), barcode.clone()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn classify_reference_shapes() {
        let single = SectionRef::classify("eas", &json!("/rundb/api/v1/eas/3/")).unwrap();
        assert_eq!(single, SectionRef::Single("/rundb/api/v1/eas/3/".into()));

        let list = SectionRef::classify("libmetrics", &json!(["/a/", "/b/"])).unwrap();
        assert_eq!(list, SectionRef::List(vec!["/a/".into(), "/b/".into()]));

        let map = SectionRef::classify("experiment", &json!({"main": "/e/1/"})).unwrap();
        assert_eq!(map, SectionRef::Map(vec![("main".into(), "/e/1/".into())]));
    }

    #[test]
    fn classify_rejects_unsupported_type() {
        let err = SectionRef::classify("tfmetrics", &json!(7)).unwrap_err();
        assert_matches!(err, QcError::Shape(message) if message.contains("tfmetrics"));
    }

    #[test]
    fn section_lookup_by_key_and_order() {
        let mut section = ResolvedSection::default();
        section.push_entry("0", json!({"a": 1}));
        section.push_entry("1", json!({"a": 2}));
        assert_eq!(section.len(), 2);
        assert_eq!(section.first().unwrap()["a"], 1);
        assert_eq!(section.get("1").unwrap()["a"], 2);
        assert!(section.get("2").is_none());
    }

    #[test]
    fn samples_with_single_barcode() {
        let mut eas = ResolvedSection::default();
        eas.push_entry(
            "0",
            json!({
                "barcodedSamples": {
                    "Patient A": {"barcodeSampleInfo": {"IonXpress_001": {}}},
                    "Patient B": {"barcodeSampleInfo": {"IonXpress_002": {}}}
                }
            }),
        );
        let samples = barcoded_samples(&eas).unwrap();
        assert_eq!(
            samples,
            vec![
                ("Patient A".to_string(), "IonXpress_001".to_string()),
                ("Patient B".to_string(), "IonXpress_002".to_string()),
            ]
        );
    }

    #[test]
    fn samples_reject_multiple_barcodes() {
        let mut eas = ResolvedSection::default();
        eas.push_entry(
            "0",
            json!({
                "barcodedSamples": {
                    "Pooled": {"barcodeSampleInfo": {"IonXpress_001": {}, "IonXpress_002": {}}}
                }
            }),
        );
        let err = barcoded_samples(&eas).unwrap_err();
        assert_matches!(err, QcError::MultiBarcodeSample(sample) if sample == "Pooled");
    }
}
