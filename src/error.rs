use thiserror::Error;

#[derive(Error, Debug)]
pub enum InspectionError {
    #[error("alert feed request failed: {0}")]
    Fetch(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("alert feed returned no rule groups")]
    EmptyRuleSet,

    #[error("alert {alert} missing '{label}'")]
    MissingLabel { alert: String, label: String },

    #[error("failed to list {kind}: {source}")]
    List {
        kind: &'static str,
        #[source]
        source: kube::Error,
    },

    #[error("failed to read logs of pod {pod}: {source}")]
    Logs {
        pod: String,
        #[source]
        source: kube::Error,
    },

    #[error("log fetch for pod {pod} stopped: permits closed")]
    LogPermitsClosed { pod: String },

    #[error("exec in pod {pod} failed: {message}")]
    Exec { pod: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl InspectionError {
    pub fn list(kind: &'static str) -> impl FnOnce(kube::Error) -> Self {
        move |source| InspectionError::List { kind, source }
    }

    pub fn missing(alert: &str, label: &str) -> Self {
        InspectionError::MissingLabel {
            alert: alert.to_string(),
            label: label.to_string(),
        }
    }
}

impl From<reqwest::Error> for InspectionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            InspectionError::Decode(e.to_string())
        } else {
            InspectionError::Fetch(e.to_string())
        }
    }
}

impl From<serde_json::Error> for InspectionError {
    fn from(e: serde_json::Error) -> Self {
        InspectionError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InspectionError>;
