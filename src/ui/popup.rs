/// Popup UI for Tabwise extension

use std::time::Duration;

use patternfly_yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlSelectElement};
use yew::prelude::*;

use crate::background::Request;
use crate::chrome::{self, ChromeStorage};
use crate::classifier::{ModelOption, fetch_models, pick_model};
use crate::environment::CredentialStore;
use crate::storage::{self, KeyCheck, check_api_key};
use crate::workflow::{OrganizeResult, Status, UndoResult};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, PartialEq)]
enum PopupState {
    Idle,
    Organizing,
    Undoing,
}

#[derive(Clone, PartialEq)]
enum Notice {
    Success(String),
    Error(String),
}

pub fn organize_notice(result: &OrganizeResult) -> String {
    if result.success {
        format!("Organized {} tabs into {} groups", result.tabs_organized, result.groups_created)
    } else {
        result.error.clone().unwrap_or_else(|| "An error occurred".to_string())
    }
}

pub fn undo_notice(result: &UndoResult) -> String {
    if result.success {
        format!("Restored {} tabs", result.tabs_restored)
    } else {
        result.error.clone().unwrap_or_else(|| "An error occurred".to_string())
    }
}

fn notice_for(result: &OrganizeResult) -> Notice {
    if result.success {
        Notice::Success(organize_notice(result))
    } else {
        Notice::Error(organize_notice(result))
    }
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| PopupState::Idle);
    let notice = use_state(|| None::<Notice>);
    let key_input = use_state(String::new);
    let key_status = use_state(|| ("Enter your OpenAI API key".to_string(), false));
    let has_key = use_state(|| false);
    let models = use_state(Vec::<ModelOption>::new);
    let selected_model = use_state(|| storage::DEFAULT_MODEL.to_string());
    let auto_enabled = use_state(|| false);
    let threshold = use_state(|| storage::DEFAULT_THRESHOLD);
    let can_undo = use_state(|| false);

    // Load settings, models and worker status on mount
    {
        let state = state.clone();
        let notice = notice.clone();
        let key_input = key_input.clone();
        let key_status = key_status.clone();
        let has_key = has_key.clone();
        let models = models.clone();
        let selected_model = selected_model.clone();
        let auto_enabled = auto_enabled.clone();
        let threshold = threshold.clone();
        let can_undo = can_undo.clone();

        use_effect_with((), move |_| {
            spawn_local(async move {
                let settings = match ChromeStorage.load().await {
                    Ok(settings) => settings,
                    Err(e) => {
                        notice.set(Some(Notice::Error(format!("Failed to load settings: {}", e))));
                        return;
                    }
                };

                if let Some(key) = settings.api_key() {
                    key_input.set(key.to_string());
                    key_status.set(("Key saved".to_string(), false));
                    has_key.set(true);
                }
                auto_enabled.set(settings.auto_organize_enabled());
                threshold.set(settings.auto_organize_threshold());

                let options = fetch_models().await;
                let saved = settings.selected_model();
                if let Some(choice) = pick_model(&options, &saved) {
                    if choice.id != saved {
                        if let Err(e) = ChromeStorage.set_selected_model(&choice.id).await {
                            log::warn!("Failed to save model: {}", e);
                        }
                    }
                    selected_model.set(choice.id.clone());
                }
                models.set(options);

                match chrome::send_message::<_, Status>(&Request::GetStatus).await {
                    Ok(status) => {
                        can_undo.set(status.can_undo);
                        if status.is_organizing {
                            state.set(PopupState::Organizing);
                            let status = poll_until_idle().await;
                            state.set(PopupState::Idle);
                            can_undo.set(status.can_undo);
                            notice.set(status.last_result.as_ref().map(notice_for));
                        } else if let Some(result) = status.last_result {
                            notice.set(Some(notice_for(&result)));
                        }
                    }
                    Err(e) => log::warn!("Failed to get status: {}", e),
                }
            });
            || ()
        });
    }

    let on_key_input = {
        let key_input = key_input.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                key_input.set(input.value());
            }
        })
    };

    let save_key = {
        let key_input = key_input.clone();
        let key_status = key_status.clone();
        let has_key = has_key.clone();
        let notice = notice.clone();

        Callback::from(move |_: ()| {
            let key = match check_api_key(&key_input) {
                KeyCheck::Valid(key) => key,
                KeyCheck::Empty => {
                    key_status.set(("Please enter a valid API key".to_string(), true));
                    has_key.set(false);
                    return;
                }
                KeyCheck::BadFormat => {
                    key_status.set(("Invalid API key format".to_string(), true));
                    has_key.set(false);
                    return;
                }
            };

            let key_status = key_status.clone();
            let has_key = has_key.clone();
            let notice = notice.clone();
            spawn_local(async move {
                match ChromeStorage.set_key(&key).await {
                    Ok(()) => {
                        key_status.set(("Key saved".to_string(), false));
                        has_key.set(true);
                        notice.set(None);
                    }
                    Err(e) => key_status.set((format!("Failed to save key: {}", e), true)),
                }
            });
        })
    };

    let on_save_click = {
        let save_key = save_key.clone();
        Callback::from(move |_: MouseEvent| save_key.emit(()))
    };

    let on_key_down = {
        let save_key = save_key.clone();
        Callback::from(move |e: KeyboardEvent| {
            if e.key() == "Enter" {
                save_key.emit(());
            }
        })
    };

    let on_model_change = {
        let selected_model = selected_model.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                let model = select.value();
                selected_model.set(model.clone());
                spawn_local(async move {
                    if let Err(e) = ChromeStorage.set_selected_model(&model).await {
                        log::warn!("Failed to save model: {}", e);
                    }
                });
            }
        })
    };

    let on_auto_toggle = {
        let auto_enabled = auto_enabled.clone();
        let threshold = threshold.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let enabled = input.checked();
                let value = *threshold;
                auto_enabled.set(enabled);
                spawn_local(async move {
                    if let Err(e) = ChromeStorage.set_auto_organize(enabled, value).await {
                        log::warn!("Failed to save auto-organize setting: {}", e);
                    }
                });
            }
        })
    };

    let on_threshold_change = {
        let auto_enabled = auto_enabled.clone();
        let threshold = threshold.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let value = storage::clamp_threshold(input.value().trim().parse().unwrap_or(storage::DEFAULT_THRESHOLD));
                input.set_value(&value.to_string());
                threshold.set(value);
                let enabled = *auto_enabled;
                spawn_local(async move {
                    if let Err(e) = ChromeStorage.set_auto_organize(enabled, value).await {
                        log::warn!("Failed to save threshold: {}", e);
                    }
                });
            }
        })
    };

    let on_organize = {
        let state = state.clone();
        let notice = notice.clone();
        let can_undo = can_undo.clone();

        Callback::from(move |_: MouseEvent| {
            if *state != PopupState::Idle {
                return;
            }
            let state = state.clone();
            let notice = notice.clone();
            let can_undo = can_undo.clone();

            state.set(PopupState::Organizing);
            notice.set(None);

            spawn_local(async move {
                match chrome::send_message::<_, OrganizeResult>(&Request::OrganizeTabs).await {
                    Ok(result) => notice.set(Some(notice_for(&result))),
                    Err(e) => notice.set(Some(Notice::Error(e.to_string()))),
                }
                if let Ok(status) = chrome::send_message::<_, Status>(&Request::GetStatus).await {
                    can_undo.set(status.can_undo);
                }
                state.set(PopupState::Idle);
            });
        })
    };

    let on_undo = {
        let state = state.clone();
        let notice = notice.clone();
        let can_undo = can_undo.clone();

        Callback::from(move |_: MouseEvent| {
            if *state != PopupState::Idle {
                return;
            }
            let state = state.clone();
            let notice = notice.clone();
            let can_undo = can_undo.clone();

            state.set(PopupState::Undoing);

            spawn_local(async move {
                match chrome::send_message::<_, UndoResult>(&Request::UndoOrganize).await {
                    Ok(result) if result.success => notice.set(Some(Notice::Success(undo_notice(&result)))),
                    Ok(result) => notice.set(Some(Notice::Error(undo_notice(&result)))),
                    Err(e) => notice.set(Some(Notice::Error(e.to_string()))),
                }
                can_undo.set(false);
                state.set(PopupState::Idle);
            });
        })
    };

    let is_busy = *state != PopupState::Idle;
    let (key_hint, key_error) = (*key_status).clone();

    html! {
        <div class="padding-20">
            <h1 class="popup-title">{"Tabwise"}</h1>

            <div class="pf-v5-c-form__group">
                <label class="pf-v5-c-form__label" for="api-key">{"OpenAI API key"}</label>
                <div class="key-row">
                    <input
                        id="api-key"
                        class="pf-v5-c-form-control"
                        type="password"
                        placeholder="sk-..."
                        value={(*key_input).clone()}
                        oninput={on_key_input}
                        onkeydown={on_key_down}
                    />
                    <Button onclick={on_save_click} variant={ButtonVariant::Secondary}>
                        {"Save"}
                    </Button>
                </div>
                <p class={if key_error { "hint error" } else { "hint" }}>{key_hint}</p>
            </div>

            <div class="pf-v5-c-form__group">
                <label class="pf-v5-c-form__label" for="model-select">{"Model"}</label>
                <select
                    id="model-select"
                    class="pf-v5-c-form-control"
                    disabled={models.is_empty()}
                    onchange={on_model_change}
                >
                    {for models.iter().map(|m| html! {
                        <option value={m.id.clone()} selected={m.id == *selected_model}>{&m.name}</option>
                    })}
                </select>
            </div>

            <div class="pf-v5-c-form__group auto-row">
                <label class="pf-v5-c-check">
                    <input
                        class="pf-v5-c-check__input"
                        type="checkbox"
                        checked={*auto_enabled}
                        onchange={on_auto_toggle}
                    />
                    <span class="pf-v5-c-check__label">{"Auto-organize when ungrouped tabs reach"}</span>
                </label>
                <input
                    class="pf-v5-c-form-control threshold-input"
                    type="number"
                    min={storage::MIN_THRESHOLD.to_string()}
                    max={storage::MAX_THRESHOLD.to_string()}
                    value={(*threshold).to_string()}
                    disabled={!*auto_enabled}
                    onchange={on_threshold_change}
                />
            </div>

            <div class="flex-column-gap">
                <Button onclick={on_organize} disabled={is_busy || !*has_key} variant={ButtonVariant::Primary} block={true}>
                    {if *state == PopupState::Organizing { "Organizing..." } else { "Organize Tabs" }}
                </Button>
                <Button onclick={on_undo} disabled={is_busy || !*can_undo} variant={ButtonVariant::Secondary} block={true}>
                    {"Undo"}
                </Button>
            </div>

            if is_busy {
                <div class="loading-text-center">
                    <Spinner />
                </div>
            }

            {match &*notice {
                Some(Notice::Success(msg)) => html! {
                    <Alert r#type={AlertType::Success} title={msg.clone()} inline={true}>
                    </Alert>
                },
                Some(Notice::Error(msg)) => html! {
                    <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                        {msg.clone()}
                    </Alert>
                },
                None => html! {},
            }}

            <p class="footer-popup">
                {"Tabwise v0.1.0"}
            </p>
        </div>
    }
}

/// Ask the worker for status until the running pass finishes
async fn poll_until_idle() -> Status {
    loop {
        yew::platform::time::sleep(POLL_INTERVAL).await;
        match chrome::send_message::<_, Status>(&Request::GetStatus).await {
            Ok(status) if !status.is_organizing => return status,
            Ok(_) => {}
            Err(e) => {
                log::warn!("Status poll failed: {}", e);
                return Status { is_organizing: false, last_result: None, can_undo: false };
            }
        }
    }
}
