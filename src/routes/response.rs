use serde::Serialize;

use crate::recipe::Recipe;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Healthz {
        name: &'a str,
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    Recipe(Recipe),
    Recipes(Vec<Recipe>),
    /// Rendered as `{}`: nothing found, or nothing to return.
    Empty {},
}

impl<'a> From<Option<Recipe>> for SuccessResponse<'a> {
    fn from(recipe: Option<Recipe>) -> Self {
        match recipe {
            Some(recipe) => SuccessResponse::Recipe(recipe),
            None => SuccessResponse::Empty {},
        }
    }
}
