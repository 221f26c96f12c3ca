use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum QcError {
    #[error("invalid report id: {0}")]
    InvalidReportId(String),

    #[error("invalid server address: {0}")]
    InvalidServer(String),

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned status {status}: {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("report status is not Completed: \"{0}\"")]
    ReportNotCompleted(String),

    #[error("plugin {plugin} is not complete, returned state {state}")]
    PluginNotReady { plugin: String, state: String },

    #[error("results from these plugins were not found: {0}")]
    PluginsMissing(String),

    #[error("cannot resolve amplicon base path: {0}")]
    PathResolution(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("sample {0} maps to more than one barcode")]
    MultiBarcodeSample(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing connection setting: {0} (flag or ampliqc.json)")]
    MissingSetting(&'static str),
}
