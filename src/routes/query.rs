use serde::Deserialize;

use crate::normalization;

/// The owner of the recipes a request is about.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    /// Query strings decode `+` as a space; this puts it back.
    #[serde(deserialize_with = "normalization::deserialize")]
    pub user_email: String,
}
