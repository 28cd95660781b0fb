//! The chatbot's action group: given a user's email and the start of a
//! recipe's details, answer with the full details.

use std::collections::HashMap;
use std::sync::Arc;

use log::{info, o, Logger};
use serde::{Deserialize, Serialize};

use crate::environment::SafeStore;
use crate::errors::BackendError;
use crate::normalization::{normalize_email, validate_email};
use crate::recipes::Recipes;
use crate::search::search_details;

const EMAIL_PARAMETER: &str = "email";
const FRAGMENT_PARAMETER: &str = "recipe_name";

/// An invocation of a function of the action group.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    pub message_version: String,
    pub action_group: String,
    pub function: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub value: String,
}

impl AgentEvent {
    /// Returns the value of the named parameter. When a name repeats,
    /// the last value counts.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub response: ActionResponse,
    pub message_version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action_group: String,
    pub function: String,
    pub function_response: FunctionResponse,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    /// Keyed by content type; only `TEXT` is produced.
    pub response_body: HashMap<String, Body>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Body {
    pub body: String,
}

impl AgentResponse {
    /// Wraps a plain-text answer to `event`.
    pub fn text(event: &AgentEvent, text: String) -> Self {
        let mut response_body = HashMap::new();
        response_body.insert("TEXT".to_owned(), Body { body: text });

        AgentResponse {
            response: ActionResponse {
                action_group: event.action_group.clone(),
                function: event.function.clone(),
                function_response: FunctionResponse { response_body },
            },
            message_version: event.message_version.clone(),
        }
    }
}

/// Answers an invocation by searching the recipes of the user it names.
pub async fn handle_event(
    logger: &Logger,
    store: Arc<SafeStore>,
    event: &AgentEvent,
) -> Result<AgentResponse, BackendError> {
    let required = |name: &str| {
        event
            .parameter(name)
            .ok_or_else(|| BackendError::invalid_payload(format!("missing parameter {}", name)))
    };

    let email = normalize_email(required(EMAIL_PARAMETER)?);
    validate_email(&email)?;
    let fragment = required(FRAGMENT_PARAMETER)?;

    let logger = logger.new(o!("action_group" => event.action_group.clone(), "function" => event.function.clone(), "user_email" => email.clone()));
    info!(logger, "Searching recipes..."; "fragment" => fragment);

    let recipes = Recipes::new(&logger, store, email);
    let answer = search_details(&recipes, fragment).await?;

    info!(logger, "Found recipe"; "answer" => &answer);

    Ok(AgentResponse::text(event, answer))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::recipe::NewRecipe;
    use crate::search::NOT_FOUND;
    use crate::store::memory::MemoryStore;

    fn event(parameters: serde_json::Value) -> AgentEvent {
        serde_json::from_value(json!({
            "messageVersion": "1.0",
            "actionGroup": "recipes",
            "function": "get_recipe",
            "agent": {"name": "recipe-helper"},
            "parameters": parameters,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn answers_wrap_the_matching_details() {
        let store = Arc::new(MemoryStore::new());
        let logger = log::discard();

        Recipes::new(&logger, store.clone(), "user@example.com")
            .create(NewRecipe {
                user_email: "user@example.com".to_owned(),
                title: "Soup".to_owned(),
                details: Some("Soup base with carrots".to_owned()),
                date: "2024-02-29".to_owned(),
            })
            .await
            .unwrap();

        let event = event(json!([
            {"name": "email", "type": "string", "value": "user@example.com"},
            {"name": "recipe_name", "type": "string", "value": "Soup"},
        ]));

        let response = handle_event(&logger, store, &event).await.unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "response": {
                    "actionGroup": "recipes",
                    "function": "get_recipe",
                    "functionResponse": {
                        "responseBody": {"TEXT": {"body": "Soup base with carrots"}}
                    }
                },
                "messageVersion": "1.0"
            })
        );
    }

    #[tokio::test]
    async fn unknown_recipes_are_reported() {
        let event = event(json!([
            {"name": "email", "value": "user@example.com"},
            {"name": "recipe_name", "value": "Pie"},
        ]));

        let response = handle_event(&log::discard(), Arc::new(MemoryStore::new()), &event)
            .await
            .unwrap();

        assert_eq!(
            response.response.function_response.response_body["TEXT"].body,
            NOT_FOUND
        );
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected() {
        let event = event(json!([{"name": "email", "value": "user@example.com"}]));

        let result = handle_event(&log::discard(), Arc::new(MemoryStore::new()), &event).await;

        assert!(matches!(result, Err(BackendError::InvalidPayload { .. })));
    }
}
