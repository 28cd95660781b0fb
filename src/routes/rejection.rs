use serde::Serialize;
use warp::reject;

use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) correlation_id: String,
    pub(crate) error: BackendError,
    pub(crate) server_timing: Option<String>,
}

impl Rejection {
    pub fn new(context: Context, correlation_id: &str, error: BackendError) -> Self {
        Rejection {
            context,
            correlation_id: correlation_id.to_owned(),
            error,
            server_timing: None,
        }
    }

    pub fn with_server_timing(self, server_timing: String) -> Self {
        Rejection {
            server_timing: Some(server_timing),
            ..self
        }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            correlation_id: self.correlation_id.clone(),
            message: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) correlation_id: String,
    pub(crate) message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Context {
    List { user_email: String },
    Retrieve { id: String },
    Create { user_email: Option<String> },
    Update { id: String },
    Delete { id: String },
}

impl Context {
    pub fn list(user_email: String) -> Context {
        Context::List { user_email }
    }

    pub fn retrieve(id: String) -> Context {
        Context::Retrieve { id }
    }

    pub fn create(user_email: Option<String>) -> Context {
        Context::Create { user_email }
    }

    pub fn update(id: String) -> Context {
        Context::Update { id }
    }

    pub fn delete(id: String) -> Context {
        Context::Delete { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_can_be_recovered_from_warp() {
        let rejection = Rejection::new(
            Context::delete("01HQ8Z2J6W5Y3N4T7V9X0K1M2P".to_owned()),
            "abc-123",
            BackendError::RecipeNotFound {
                id: "01HQ8Z2J6W5Y3N4T7V9X0K1M2P".to_owned(),
            },
        )
        .with_server_timing("handler;dur=1.5".to_owned());

        let rej: reject::Rejection = rejection.into();
        let found = rej.find::<Rejection>().expect("find custom rejection");

        assert_eq!(found.correlation_id, "abc-123");
        assert_eq!(found.server_timing.as_deref(), Some("handler;dur=1.5"));

        let flattened = serde_json::to_value(found.flatten()).unwrap();
        assert_eq!(flattened["operation"], "delete");
        assert_eq!(flattened["correlation_id"], "abc-123");
    }
}
