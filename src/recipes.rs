use std::sync::Arc;

use log::{debug, error, info, o, Logger};

use crate::environment::SafeStore;
use crate::errors::BackendError;
use crate::keys::{self, RECIPE_PREFIX};
use crate::recipe::{timestamp, NewRecipe, Recipe, RecipeUpdate};

/// The recipes of a single user.
pub struct Recipes {
    logger: Logger,
    store: Arc<SafeStore>,
    partition_key: String,
}

impl Recipes {
    pub fn new(logger: &Logger, store: Arc<SafeStore>, user_email: impl Into<String>) -> Self {
        let user_email: String = user_email.into();
        let partition_key = keys::user_partition(&user_email);

        Recipes {
            logger: logger.new(o!("partition_key" => partition_key.clone())),
            store,
            partition_key,
        }
    }

    /// Returns every recipe of the user, oldest first.
    pub async fn list(&self) -> Result<Vec<Recipe>, BackendError> {
        info!(self.logger, "Retrieving all recipes...");

        let items = self
            .store
            .query_prefix(&self.partition_key, RECIPE_PREFIX)
            .await?;

        info!(self.logger, "Retrieved recipes"; "count" => items.len());

        items.iter().map(Recipe::from_item).collect()
    }

    /// Returns the recipe with the given identifier, if it exists.
    pub async fn get(&self, id: &str) -> Result<Option<Recipe>, BackendError> {
        info!(self.logger, "Retrieving recipe..."; "id" => id);

        let item = self
            .store
            .get(&self.partition_key, &keys::recipe_sort_key(id))
            .await?;

        let recipe = item.as_ref().map(Recipe::from_item).transpose()?;
        debug!(self.logger, "Retrieved recipe"; "found" => recipe.is_some());

        Ok(recipe)
    }

    /// Stores a new recipe under a freshly minted identifier. Calling
    /// this twice with the same data creates two recipes.
    pub async fn create(&self, new_recipe: NewRecipe) -> Result<Recipe, BackendError> {
        let id = keys::mint_id();
        let recipe = Recipe::new(self.partition_key.clone(), &id, new_recipe, timestamp());
        recipe.validate()?;

        info!(self.logger, "Creating recipe..."; "id" => &id);
        self.store.put(recipe.to_item()).await?;

        Ok(recipe)
    }

    /// Applies a partial update to an existing recipe and returns the
    /// result as stored.
    pub async fn update(&self, id: &str, update: RecipeUpdate) -> Result<Recipe, BackendError> {
        self.ensure_exists(id, "update").await?;

        info!(self.logger, "Updating recipe..."; "id" => id);
        let sort_key = keys::recipe_sort_key(id);
        let changes = update.to_changes(&timestamp());

        // the recipe may have been deleted since the check
        if !self
            .store
            .update(&self.partition_key, &sort_key, changes)
            .await?
        {
            return Err(not_found(id));
        }

        self.get(id).await?.ok_or_else(|| not_found(id))
    }

    /// Deletes an existing recipe.
    pub async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.ensure_exists(id, "delete").await?;

        info!(self.logger, "Deleting recipe..."; "id" => id);
        self.store
            .delete(&self.partition_key, &keys::recipe_sort_key(id))
            .await
    }

    async fn ensure_exists(&self, id: &str, operation: &str) -> Result<(), BackendError> {
        match self.get(id).await? {
            Some(_) => Ok(()),
            None => {
                error!(self.logger, "Recipe to {} does not exist", operation; "id" => id);
                Err(not_found(id))
            }
        }
    }
}

fn not_found(id: &str) -> BackendError {
    BackendError::RecipeNotFound { id: id.to_owned() }
}
