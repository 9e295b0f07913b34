/// Bindings to the chrome.* APIs and fetch through `bridge.js`
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::environment::{CredentialStore, SettingsStore, TabEnvironment};
use crate::error::BrowserError;
use crate::storage::{self, StoredSettings};
use crate::tab_data::{BrowserTab, GroupColor, GroupId, GroupInfo, TabId, Window};

// Import JS bridge functions
#[wasm_bindgen(module = "/bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn queryTabs(window_id: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn queryGroups(window_id: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn ungroupTabs(tab_ids: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn groupTabs(tab_ids: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn updateGroup(group_id: i32, properties: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn getStorage(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(items: JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn removeStorage(key: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn fetchText(request: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn sendMessage(message: JsValue) -> Result<JsValue, JsValue>;
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, BrowserError> {
    // Plain objects, not Maps, so chrome.* accepts them
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(value.serialize(&serializer)?)
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, BrowserError> {
    Ok(serde_wasm_bindgen::from_value(value)?)
}

fn window_arg(window: Window) -> JsValue {
    window.as_id().map(JsValue::from).unwrap_or(JsValue::UNDEFINED)
}

/// Tabs and tab groups through `chrome.tabs` / `chrome.tabGroups`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeTabs;

impl TabEnvironment for ChromeTabs {
    async fn list_tabs(&self, window: Window) -> Result<Vec<BrowserTab>, BrowserError> {
        from_js(queryTabs(window_arg(window)).await?)
    }

    async fn list_groups(&self, window: Window) -> Result<Vec<GroupInfo>, BrowserError> {
        from_js(queryGroups(window_arg(window)).await?)
    }

    async fn ungroup(&self, tab_ids: &[TabId]) -> Result<(), BrowserError> {
        Ok(ungroupTabs(to_js(tab_ids)?).await?)
    }

    async fn group(&self, tab_ids: &[TabId]) -> Result<GroupId, BrowserError> {
        from_js(groupTabs(to_js(tab_ids)?).await?)
    }

    async fn set_group_meta(
        &self,
        group_id: GroupId,
        title: &str,
        color: GroupColor,
        collapsed: bool,
    ) -> Result<(), BrowserError> {
        #[derive(Serialize)]
        struct GroupUpdate<'a> {
            title: &'a str,
            color: GroupColor,
            collapsed: bool,
        }

        Ok(updateGroup(group_id, to_js(&GroupUpdate { title, color, collapsed })?).await?)
    }
}

/// Settings and the API key in `chrome.storage.local`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

impl ChromeStorage {
    pub async fn load(&self) -> Result<StoredSettings, BrowserError> {
        from_js(getStorage(to_js(&storage::ALL_KEYS)?).await?)
    }

    /// Write the keys that are `Some` in `settings`
    pub async fn save(&self, settings: &StoredSettings) -> Result<(), BrowserError> {
        Ok(setStorage(to_js(settings)?).await?)
    }

    pub async fn set_selected_model(&self, model: &str) -> Result<(), BrowserError> {
        self.save(&StoredSettings { selected_model: Some(model.to_string()), ..Default::default() })
            .await
    }

    pub async fn set_auto_organize(&self, enabled: bool, threshold: u32) -> Result<(), BrowserError> {
        self.save(&StoredSettings {
            auto_organize_enabled: Some(enabled),
            auto_organize_threshold: Some(storage::clamp_threshold(threshold)),
            ..Default::default()
        })
        .await
    }
}

impl CredentialStore for ChromeStorage {
    async fn get_key(&self) -> Result<Option<String>, BrowserError> {
        Ok(self.load().await?.api_key().map(str::to_string))
    }

    async fn set_key(&self, key: &str) -> Result<(), BrowserError> {
        self.save(&StoredSettings { api_key: Some(key.to_string()), ..Default::default() })
            .await
    }

    async fn clear_key(&self) -> Result<(), BrowserError> {
        Ok(removeStorage(storage::API_KEY).await?)
    }
}

impl SettingsStore for ChromeStorage {
    async fn selected_model(&self) -> Result<String, BrowserError> {
        Ok(self.load().await?.selected_model())
    }

    async fn auto_organize_enabled(&self) -> Result<bool, BrowserError> {
        Ok(self.load().await?.auto_organize_enabled())
    }

    async fn auto_organize_threshold(&self) -> Result<u32, BrowserError> {
        Ok(self.load().await?.auto_organize_threshold())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        HttpRequest { url: url.to_string(), method: "GET".to_string(), headers: BTreeMap::new(), body: None }
    }

    pub fn post_json(url: &str, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        HttpRequest { url: url.to_string(), method: "POST".to_string(), headers, body: Some(body.to_string()) }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network errors come back as `Err`; HTTP error statuses do not
pub async fn fetch(request: &HttpRequest) -> Result<HttpResponse, BrowserError> {
    from_js(fetchText(to_js(request)?).await?)
}

/// `chrome.runtime.sendMessage` round trip to the service worker
pub async fn send_message<Req: Serialize, Resp: DeserializeOwned>(message: &Req) -> Result<Resp, BrowserError> {
    let response = sendMessage(to_js(message)?).await?;
    if response.is_undefined() || response.is_null() {
        return Err(BrowserError::new("No response from background"));
    }
    from_js(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_json_request() {
        let request = HttpRequest::post_json("https://api.example/v1", &json!({ "model": "m" })).bearer("sk-1");

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["method"], "POST");
        assert_eq!(value["headers"]["Authorization"], "Bearer sk-1");
        assert_eq!(value["headers"]["Content-Type"], "application/json");
        assert_eq!(value["body"], r#"{"model":"m"}"#);
    }

    #[test]
    fn test_get_request_has_no_body() {
        let value = serde_json::to_value(HttpRequest::get("https://models.example")).unwrap();
        assert!(value.get("body").is_none());
    }

    #[test]
    fn test_response_status() {
        assert!(HttpResponse { status: 204, body: String::new() }.is_success());
        assert!(!HttpResponse { status: 429, body: String::new() }.is_success());
    }
}
