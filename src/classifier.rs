/// OpenAI chat-completion classifier and the OpenRouter model catalogue
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::chrome::{self, HttpRequest, HttpResponse};
use crate::environment::Classifier;
use crate::error::ClassifierError;
use crate::tab_data::{GroupColor, GroupProposal, TabRecord};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENROUTER_MODELS_URL: &str = "https://openrouter.ai/api/v1/models";

const SYSTEM_PROMPT: &str = "You are a browser tab organizer. Given a list of browser tabs with their titles, URLs, and current group assignments, reorganize them into logical groups.

Rules:
- Create concise, descriptive group names (1-3 words max)
- Use appropriate colors from: grey, blue, red, yellow, green, pink, purple, cyan, orange
- Group tabs by topic, project, or domain
- Every tab must be assigned to exactly one group
- Aim for 2-6 groups depending on tab diversity
- If tabs are very similar, use fewer groups
- If tabs are diverse, use more groups
- Consider existing group assignments: keep well-organized groups, merge or split as needed
- If a tab's current group makes sense, you can keep it there
- Feel free to rename groups for clarity or merge similar ones

Return the groups with the exact tab IDs provided.";

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GroupsPayload {
    groups: Vec<GroupProposal>,
}

fn response_schema() -> Value {
    let colors: Vec<&str> = GroupColor::ALL.iter().map(|c| c.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "groups": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "Short, descriptive name for the group (1-3 words)"
                        },
                        "color": {
                            "type": "string",
                            "enum": colors,
                            "description": "Tab group color"
                        },
                        "tabIds": {
                            "type": "array",
                            "items": { "type": "number" },
                            "description": "Array of tab IDs belonging to this group"
                        }
                    },
                    "required": ["name", "color", "tabIds"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["groups"],
        "additionalProperties": false
    })
}

fn format_tabs(tabs: &[TabRecord]) -> String {
    tabs.iter()
        .map(|tab| {
            let group = match &tab.current_group_name {
                Some(name) => format!("\"{}\"", name),
                None => "none".to_string(),
            };
            format!("- ID: {}, Title: \"{}\", URL: {}, Current Group: {}", tab.id, tab.title, tab.url, group)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn user_message(tabs: &[TabRecord]) -> String {
    let intro = if tabs.iter().any(|t| t.current_group_name.is_some()) {
        format!(
            "Please reorganize these {} browser tabs. Some are already grouped - keep good groupings, improve or merge others as needed:",
            tabs.len()
        )
    } else {
        format!("Please organize these {} browser tabs into groups:", tabs.len())
    };
    format!("{}\n\n{}", intro, format_tabs(tabs))
}

/// JSON body of the chat-completion request
pub fn build_request_body(tabs: &[TabRecord], model: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": user_message(tabs) }
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "tab_groups",
                "strict": true,
                "schema": response_schema()
            }
        }
    })
}

/// Remote `error.message` when the body carries one, else `API error: <status>`
pub fn api_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("API error: {}", status))
}

/// Pull the proposals out of a chat-completion response body.
///
/// No id filtering happens here; that is the workflow's job.
pub fn parse_completion(response: &HttpResponse) -> Result<Vec<GroupProposal>, ClassifierError> {
    if !response.is_success() {
        return Err(ClassifierError::Api(api_error_message(response.status, &response.body)));
    }

    let chat: ChatResponse =
        serde_json::from_str(&response.body).map_err(|e| ClassifierError::Malformed(e.to_string()))?;
    let content = chat
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.is_empty())
        .ok_or(ClassifierError::EmptyResponse)?;

    let payload: GroupsPayload =
        serde_json::from_str(&content).map_err(|e| ClassifierError::Malformed(e.to_string()))?;
    Ok(payload.groups)
}

/// Classifier backed by the OpenAI chat-completion endpoint
#[derive(Debug, Clone, Default)]
pub struct OpenAiClassifier;

impl Classifier for OpenAiClassifier {
    async fn classify(
        &self,
        api_key: &str,
        tabs: &[TabRecord],
        model: &str,
    ) -> Result<Vec<GroupProposal>, ClassifierError> {
        if tabs.is_empty() {
            return Ok(Vec::new());
        }

        let request = HttpRequest::post_json(OPENAI_API_URL, &build_request_body(tabs, model))
            .bearer(api_key);
        info!("Requesting grouping of {} tabs from {}", tabs.len(), model);
        let response = chrome::fetch(&request).await?;
        parse_completion(&response)
    }
}

/// Entry of the model dropdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenRouterResponse {
    data: Vec<ModelOption>,
}

pub fn fallback_models() -> Vec<ModelOption> {
    [("gpt-4o-mini", "GPT-4o Mini"), ("gpt-4o", "GPT-4o"), ("gpt-4-turbo", "GPT-4 Turbo")]
        .into_iter()
        .map(|(id, name)| ModelOption { id: id.to_string(), name: name.to_string() })
        .collect()
}

/// Keep OpenAI models only, strip the `openai/` prefix, sort by display name
pub fn parse_model_catalogue(body: &str) -> Result<Vec<ModelOption>, serde_json::Error> {
    let catalogue: OpenRouterResponse = serde_json::from_str(body)?;
    let mut models: Vec<ModelOption> = catalogue
        .data
        .into_iter()
        .filter_map(|m| {
            m.id.strip_prefix("openai/")
                .map(|id| ModelOption { id: id.to_string(), name: m.name.clone() })
        })
        .collect();
    models.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(models)
}

/// Load the model dropdown; any failure yields the fallback list
pub async fn fetch_models() -> Vec<ModelOption> {
    let response = match chrome::fetch(&HttpRequest::get(OPENROUTER_MODELS_URL)).await {
        Ok(response) if response.is_success() => response,
        Ok(response) => {
            warn!("Failed to fetch models: {}", response.status);
            return fallback_models();
        }
        Err(e) => {
            warn!("Failed to fetch models: {}", e);
            return fallback_models();
        }
    };

    match parse_model_catalogue(&response.body) {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => fallback_models(),
        Err(e) => {
            warn!("Failed to parse models: {}", e);
            fallback_models()
        }
    }
}

/// The saved model when the catalogue offers it, else the first entry
pub fn pick_model<'a>(models: &'a [ModelOption], saved: &str) -> Option<&'a ModelOption> {
    models.iter().find(|m| m.id == saved).or_else(|| models.first())
}
