/// Error types shared by the workflows and their collaborators
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// A failed `chrome.*` or `fetch` call
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct BrowserError(pub String);

impl BrowserError {
    pub fn new(message: impl Into<String>) -> Self {
        BrowserError(message.into())
    }
}

impl From<JsValue> for BrowserError {
    fn from(value: JsValue) -> Self {
        if let Some(err) = value.dyn_ref::<js_sys::Error>() {
            return BrowserError(String::from(err.message()));
        }
        match value.as_string() {
            Some(message) => BrowserError(message),
            None => BrowserError(format!("{:?}", value)),
        }
    }
}

impl From<serde_wasm_bindgen::Error> for BrowserError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        BrowserError(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error(transparent)]
    Transport(#[from] BrowserError),

    /// Non-2xx status; carries the provider's message or `API error: <status>`
    #[error("{0}")]
    Api(String),

    #[error("No response from OpenAI")]
    EmptyResponse,

    #[error("Invalid response from OpenAI: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrganizeError {
    #[error("Already organizing tabs")]
    Busy,

    #[error("Please save your API key first")]
    MissingKey,

    #[error("No tabs to organize")]
    NothingToOrganize,

    #[error("Need at least 2 tabs to organize")]
    NeedTwoTabs,

    #[error("Could not organize tabs")]
    NoGroups,

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UndoError {
    #[error("Nothing to restore")]
    NothingToRestore,

    #[error(transparent)]
    Browser(#[from] BrowserError),
}
