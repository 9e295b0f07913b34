/// Service worker side: message dispatch, tab events, keyboard command
use std::rc::Rc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::auto_organize::{AutoOrganizeTrigger, DEBOUNCE_DELAY, PlatformScheduler, check_and_organize};
use crate::chrome::{ChromeStorage, ChromeTabs};
use crate::classifier::OpenAiClassifier;
use crate::environment::{Classifier, CredentialStore, SettingsStore, TabEnvironment};
use crate::tab_data::{BrowserTab, Window};
use crate::workflow::{OrganizeResult, Organizer, Status, UndoResult, WorkflowState};

pub const ORGANIZE_COMMAND: &str = "organize-tabs";

/// Messages the popup sends over `chrome.runtime`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "ORGANIZE_TABS")]
    OrganizeTabs,
    #[serde(rename = "UNDO_ORGANIZE")]
    UndoOrganize,
    #[serde(rename = "GET_STATUS")]
    GetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Organize(OrganizeResult),
    Undo(UndoResult),
    Status(Status),
}

pub async fn dispatch<E, C, S>(organizer: &Organizer<E, C, S>, request: Request) -> Response
where
    E: TabEnvironment,
    C: Classifier,
    S: CredentialStore + SettingsStore,
{
    match request {
        Request::OrganizeTabs => Response::Organize(organizer.organize().await),
        Request::UndoOrganize => Response::Undo(organizer.undo().await),
        Request::GetStatus => Response::Status(organizer.status()),
    }
}

type ChromeOrganizer = Organizer<ChromeTabs, OpenAiClassifier, ChromeStorage>;

struct Background {
    organizer: Rc<ChromeOrganizer>,
    trigger: AutoOrganizeTrigger<PlatformScheduler>,
}

impl Background {
    fn new() -> Self {
        let state = Rc::new(WorkflowState::new());
        let organizer = Rc::new(Organizer::new(ChromeTabs, OpenAiClassifier, ChromeStorage, state));

        let on_fire = {
            let organizer = organizer.clone();
            Rc::new(move |window: Window| {
                let organizer = organizer.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    check_and_organize(organizer.as_ref(), window).await;
                });
            })
        };

        Background {
            organizer,
            trigger: AutoOrganizeTrigger::new(PlatformScheduler, DEBOUNCE_DELAY, on_fire),
        }
    }
}

thread_local! {
    static BACKGROUND: Background = Background::new();
}

fn shared_organizer() -> Rc<ChromeOrganizer> {
    BACKGROUND.with(|b| b.organizer.clone())
}

/// `chrome.runtime.onMessage` handler
#[wasm_bindgen]
pub async fn handle_message(message: JsValue) -> Result<JsValue, JsValue> {
    let request: Request = serde_wasm_bindgen::from_value(message)?;
    let organizer = shared_organizer();
    let response = dispatch(organizer.as_ref(), request).await;
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(response.serialize(&serializer)?)
}

/// `chrome.tabs.onCreated` handler
#[wasm_bindgen]
pub fn on_tab_created(tab: JsValue, window_id: i32) {
    match serde_wasm_bindgen::from_value::<BrowserTab>(tab) {
        Ok(tab) => BACKGROUND.with(|b| b.trigger.on_tab_created(&tab, window_id)),
        Err(e) => warn!("Ignoring unreadable tab event: {}", e),
    }
}

/// `chrome.commands.onCommand` handler
#[wasm_bindgen]
pub async fn on_command(command: String) {
    if command != ORGANIZE_COMMAND {
        return;
    }
    let result = shared_organizer().organize().await;
    match result.error {
        None => info!("Shortcut organized {} tabs into {} groups", result.tabs_organized, result.groups_created),
        Some(message) => warn!("Shortcut organize failed: {}", message),
    }
}

/// `chrome.runtime.onInstalled` / `onStartup` handler
#[wasm_bindgen]
pub fn on_lifecycle(reason: &str) {
    match reason {
        "install" => info!("Tabwise installed"),
        "update" => info!("Tabwise updated"),
        "startup" => info!("Tabwise started"),
        other => info!("Tabwise lifecycle event: {}", other),
    }
}
