//! Prefix search over a user's recipe details, used by the chatbot.

use crate::errors::BackendError;
use crate::recipe::Recipe;
use crate::recipes::Recipes;

/// Answer given when no recipe matches.
pub const NOT_FOUND: &str = "NOT FOUND!";

/// Scans `recipes` in order and returns the recipe whose details start
/// with `fragment` (case-sensitive). When several match, the *last* one
/// wins. Recipes without details never match.
// TODO confirm whether the first match (or every match) was intended
pub fn find_by_details_prefix<'a>(recipes: &'a [Recipe], fragment: &str) -> Option<&'a Recipe> {
    recipes
        .iter()
        .filter(|recipe| {
            recipe
                .details
                .as_deref()
                .map_or(false, |details| details.starts_with(fragment))
        })
        .last()
}

/// Lists the user's recipes and returns the details of the matching
/// one, or [`NOT_FOUND`].
pub async fn search_details(recipes: &Recipes, fragment: &str) -> Result<String, BackendError> {
    let all = recipes.list().await?;

    Ok(find_by_details_prefix(&all, fragment)
        .and_then(|recipe| recipe.details.clone())
        .unwrap_or_else(|| NOT_FOUND.to_owned()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::recipe::NewRecipe;
    use crate::store::memory::MemoryStore;

    fn recipe(details: Option<&str>) -> Recipe {
        Recipe {
            partition_key: "USER#user@example.com".to_owned(),
            sort_key: "RECIPE#1".to_owned(),
            title: "Soup".to_owned(),
            details: details.map(str::to_owned),
            date: "2024-02-29".to_owned(),
            created_at: "2024-01-05T05:51:02.350000Z".to_owned(),
            updated_at: "2024-01-05T05:51:02.350000Z".to_owned(),
        }
    }

    #[test]
    fn the_last_match_wins() {
        let recipes = vec![recipe(Some("Soup base")), recipe(Some("Soup deluxe"))];

        let found = find_by_details_prefix(&recipes, "Soup").unwrap();
        assert_eq!(found.details.as_deref(), Some("Soup deluxe"));
    }

    #[test]
    fn matching_is_a_case_sensitive_prefix() {
        let recipes = vec![
            recipe(Some("Tomato soup")),
            recipe(None),
            recipe(Some("soup of the day")),
        ];

        assert!(find_by_details_prefix(&recipes, "Soup").is_none());
        assert_eq!(
            find_by_details_prefix(&recipes, "Tomato").unwrap().details.as_deref(),
            Some("Tomato soup")
        );
    }

    proptest! {
        #[test]
        fn matches_start_with_the_fragment(details in proptest::collection::vec("[a-c]{0,4}", 0..8), fragment in "[a-c]{0,2}") {
            let recipes: Vec<_> = details.iter().map(|d| recipe(Some(d.as_str()))).collect();

            match find_by_details_prefix(&recipes, &fragment) {
                Some(found) => {
                    let found_details = found.details.as_deref().unwrap();
                    prop_assert!(found_details.starts_with(&fragment));
                    let last = details.iter().rposition(|d| d.starts_with(&fragment)).unwrap();
                    prop_assert_eq!(found_details, details[last].as_str());
                }
                None => prop_assert!(details.iter().all(|d| !d.starts_with(&fragment))),
            }
        }
    }

    #[tokio::test]
    async fn searching_a_users_recipes() {
        let recipes = Recipes::new(&log::discard(), Arc::new(MemoryStore::new()), "user@example.com");

        assert_eq!(search_details(&recipes, "Soup").await.unwrap(), NOT_FOUND);

        for details in &["Soup base", "Soup deluxe", "Salad"] {
            recipes
                .create(NewRecipe {
                    user_email: "user@example.com".to_owned(),
                    title: "Soup".to_owned(),
                    details: Some(details.to_string()),
                    date: "2024-02-29".to_owned(),
                })
                .await
                .unwrap();
        }

        assert_eq!(search_details(&recipes, "Soup").await.unwrap(), "Soup deluxe");
        assert_eq!(search_details(&recipes, "Sal").await.unwrap(), "Salad");
    }
}
