use serde::{Deserialize, Deserializer, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::errors::BackendError;
use crate::keys::{self, PARTITION_KEY, RECIPE_PREFIX, SORT_KEY, USER_PREFIX};
use crate::normalization::{self, validate_email};
use crate::store::{Changes, Item};

const TITLE: &str = "recipe_title";
const DETAILS: &str = "recipe_details";
const DATE: &str = "recipe_date";
const CREATED_AT: &str = "created_at";
const UPDATED_AT: &str = "updated_at";

/// Returns the current time as an ISO-8601 UTC timestamp with a fixed
/// number of fractional digits, so timestamps compare correctly as
/// strings.
pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .expect("format current time")
}

/// A single recipe in the table.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Recipe {
    /// The partition of the owner, `USER#<email>`.
    #[serde(rename = "PK")]
    pub partition_key: String,

    /// `RECIPE#<ulid>`.
    #[serde(rename = "SK")]
    pub sort_key: String,

    #[serde(rename = "recipe_title")]
    pub title: String,

    /// Free text. The chatbot searches this.
    #[serde(rename = "recipe_details", skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,

    /// The calendar date the recipe is for, `YYYY-MM-DD`.
    #[serde(rename = "recipe_date")]
    pub date: String,

    pub created_at: String,

    pub updated_at: String,
}

impl Recipe {
    /// Builds a new recipe for `partition_key` out of a create request.
    /// Both timestamps are set to `now`.
    pub fn new(partition_key: String, id: &str, new_recipe: NewRecipe, now: String) -> Self {
        Recipe {
            partition_key,
            sort_key: keys::recipe_sort_key(id),
            title: new_recipe.title,
            details: new_recipe.details,
            date: new_recipe.date,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The identifier of the recipe, without the sort key prefix.
    pub fn id(&self) -> &str {
        keys::recipe_id(&self.sort_key).unwrap_or(&self.sort_key)
    }

    /// Checks the key formats and field contents.
    pub fn validate(&self) -> Result<(), BackendError> {
        let email = self
            .partition_key
            .strip_prefix(USER_PREFIX)
            .ok_or_else(|| BackendError::invalid_payload(format!("PK must start with {}", USER_PREFIX)))?;
        validate_email(email)?;

        if !self.sort_key.starts_with(RECIPE_PREFIX) {
            return Err(BackendError::invalid_payload(format!(
                "SK must start with {}",
                RECIPE_PREFIX
            )));
        }

        validate_title(&self.title)?;
        validate_date(&self.date)
    }

    /// Converts the recipe into a sparse item: a missing `details` is
    /// left out rather than stored empty.
    pub fn to_item(&self) -> Item {
        Item::new()
            .set_string(PARTITION_KEY, self.partition_key.as_str())
            .set_string(SORT_KEY, self.sort_key.as_str())
            .set_string(TITLE, self.title.as_str())
            .set_optional_string(DETAILS, self.details.as_deref())
            .set_string(DATE, self.date.as_str())
            .set_string(CREATED_AT, self.created_at.as_str())
            .set_string(UPDATED_AT, self.updated_at.as_str())
    }

    pub fn from_item(item: &Item) -> Result<Self, BackendError> {
        let required = |name: &str| {
            item.get_string(name)
                .map(str::to_owned)
                .ok_or_else(|| BackendError::MalformedItem {
                    attribute: name.to_owned(),
                })
        };

        let details = match item.get(DETAILS) {
            None => None,
            Some(_) => Some(required(DETAILS)?),
        };

        Ok(Recipe {
            partition_key: required(PARTITION_KEY)?,
            sort_key: required(SORT_KEY)?,
            title: required(TITLE)?,
            details,
            date: required(DATE)?,
            created_at: required(CREATED_AT)?,
            updated_at: required(UPDATED_AT)?,
        })
    }
}

/// The body of a create request.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NewRecipe {
    /// The owner. Spaces are turned back into `+`.
    #[serde(deserialize_with = "normalization::deserialize")]
    pub user_email: String,

    #[serde(rename = "recipe_title")]
    pub title: String,

    #[serde(rename = "recipe_details", default)]
    pub details: Option<String>,

    #[serde(rename = "recipe_date")]
    pub date: String,
}

impl NewRecipe {
    pub fn validate(&self) -> Result<(), BackendError> {
        validate_email(&self.user_email)?;
        validate_title(&self.title)?;
        validate_date(&self.date)
    }
}

/// A field of a partial update: left alone, cleared, or overwritten.
#[derive(Clone, Debug, PartialEq)]
pub enum Patch<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Patch::Value(value) => Some(value),
            _ => None,
        }
    }
}

// only reached for fields present in the body; missing fields fall
// back to `Default`
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        Option::<T>::deserialize(deserializer).map(|value| match value {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}

/// The body of a patch request. Only the fields present are touched;
/// `"recipe_details": null` removes the details.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RecipeUpdate {
    #[serde(rename = "recipe_title", default)]
    pub title: Patch<String>,

    #[serde(rename = "recipe_details", default)]
    pub details: Patch<String>,

    #[serde(rename = "recipe_date", default)]
    pub date: Patch<String>,
}

impl RecipeUpdate {
    pub fn validate(&self) -> Result<(), BackendError> {
        match &self.title {
            Patch::Null => return Err(BackendError::invalid_payload("recipe_title cannot be null")),
            Patch::Value(title) => validate_title(title)?,
            Patch::Absent => {}
        }

        match &self.date {
            Patch::Null => Err(BackendError::invalid_payload("recipe_date cannot be null")),
            Patch::Value(date) => validate_date(date),
            Patch::Absent => Ok(()),
        }
    }

    /// Converts the update into the attributes to set and remove,
    /// stamping `updated_at`.
    pub fn to_changes(&self, updated_at: &str) -> Changes {
        let mut changes = Changes {
            set: Item::new()
                .set_optional_string(TITLE, self.title.as_value().map(String::as_str))
                .set_optional_string(DETAILS, self.details.as_value().map(String::as_str))
                .set_optional_string(DATE, self.date.as_value().map(String::as_str))
                .set_string(UPDATED_AT, updated_at),
            remove: vec![],
        };

        if let Patch::Null = self.details {
            changes.remove.push(DETAILS.to_owned());
        }

        changes
    }
}

fn validate_title(title: &str) -> Result<(), BackendError> {
    if title.trim().is_empty() {
        Err(BackendError::invalid_payload("recipe_title must not be empty"))
    } else {
        Ok(())
    }
}

fn validate_date(date: &str) -> Result<(), BackendError> {
    Date::parse(date, format_description!("[year]-[month]-[day]"))
        .map(|_| ())
        .map_err(|e| BackendError::invalid_payload(format!("recipe_date {:?} is not a YYYY-MM-DD date: {}", date, e)))
}

#[cfg(test)]
mod tests {
    use aws_sdk_dynamodb::types::AttributeValue;

    use super::*;

    fn pasta() -> Recipe {
        Recipe {
            partition_key: "USER#rick@example.com".to_owned(),
            sort_key: "RECIPE#01HQ8Z2J6W5Y3N4T7V9X0K1M2P".to_owned(),
            title: "Pasta".to_owned(),
            details: Some("Boil water first".to_owned()),
            date: "2024-02-29".to_owned(),
            created_at: "2024-01-05T05:51:02.350000Z".to_owned(),
            updated_at: "2024-01-06T02:31:02.350000Z".to_owned(),
        }
    }

    #[test]
    fn items_wrap_every_field_as_a_string() {
        let item = pasta().to_item();

        assert_eq!(item.len(), 7);
        assert_eq!(
            item.get("recipe_title"),
            Some(&AttributeValue::S("Pasta".to_owned()))
        );
        assert_eq!(item.get_string("PK"), Some("USER#rick@example.com"));
        assert_eq!(Recipe::from_item(&item).unwrap(), pasta());
    }

    #[test]
    fn missing_details_are_left_out() {
        let recipe = Recipe {
            details: None,
            ..pasta()
        };
        let item = recipe.to_item();

        assert!(!item.contains("recipe_details"));
        assert_eq!(Recipe::from_item(&item).unwrap().details, None);

        let json = serde_json::to_value(&recipe).unwrap();
        assert!(json.get("recipe_details").is_none());
        assert_eq!(json["SK"], "RECIPE#01HQ8Z2J6W5Y3N4T7V9X0K1M2P");
    }

    #[test]
    fn malformed_items_name_the_attribute() {
        let item = Item::from(pasta().to_item().into_attributes().into_iter().filter(|(k, _)| k != "recipe_date").collect::<std::collections::HashMap<_, _>>());

        match Recipe::from_item(&item) {
            Err(BackendError::MalformedItem { attribute }) => assert_eq!(attribute, "recipe_date"),
            other => panic!("unexpected result {:?}", other),
        }

        let item = pasta().to_item().set_string("recipe_title", "ok");
        let mut attributes = item.into_attributes();
        attributes.insert("recipe_details".to_owned(), AttributeValue::Bool(true));

        assert!(Recipe::from_item(&Item::from(attributes)).is_err());
    }

    #[test]
    fn validation_checks_keys_and_fields() {
        assert!(pasta().validate().is_ok());
        assert!(Recipe { partition_key: "rick@example.com".to_owned(), ..pasta() }.validate().is_err());
        assert!(Recipe { partition_key: "USER#rick".to_owned(), ..pasta() }.validate().is_err());
        assert!(Recipe { sort_key: "NOTE#1".to_owned(), ..pasta() }.validate().is_err());
        assert!(Recipe { date: "2023-02-29".to_owned(), ..pasta() }.validate().is_err());
        assert!(Recipe { title: " ".to_owned(), ..pasta() }.validate().is_err());
    }

    #[test]
    fn new_recipes_normalize_the_email() {
        let new_recipe: NewRecipe = serde_json::from_str(
            r#"{"user_email": "rick test@example.com", "recipe_title": "Pasta", "recipe_date": "2024-02-29"}"#,
        )
        .unwrap();

        assert_eq!(new_recipe.user_email, "rick+test@example.com");
        assert_eq!(new_recipe.details, None);
        assert!(new_recipe.validate().is_ok());

        let recipe = Recipe::new(keys::user_partition(&new_recipe.user_email), "ID", new_recipe, timestamp());
        assert_eq!(recipe.created_at, recipe.updated_at);
        assert_eq!(recipe.id(), "ID");
        assert!(recipe.validate().is_ok());
    }

    #[test]
    fn new_recipes_reject_unknown_and_missing_fields() {
        assert!(serde_json::from_str::<NewRecipe>(
            r#"{"user_email": "a@b.co", "recipe_title": "Pasta", "recipe_date": "2024-02-29", "rating": 5}"#
        )
        .is_err());
        assert!(serde_json::from_str::<NewRecipe>(r#"{"user_email": "a@b.co", "recipe_date": "2024-02-29"}"#).is_err());
    }

    #[test]
    fn updates_distinguish_null_from_absent() {
        let update: RecipeUpdate = serde_json::from_str(r#"{"recipe_details": null}"#).unwrap();
        assert_eq!(update.details, Patch::Null);
        assert!(update.title.is_absent());

        let changes = update.to_changes("2024-03-01T00:00:00.000000Z");
        assert_eq!(changes.remove, vec!["recipe_details".to_owned()]);
        assert_eq!(changes.set.len(), 1);
        assert_eq!(changes.set.get_string("updated_at"), Some("2024-03-01T00:00:00.000000Z"));

        let update: RecipeUpdate = serde_json::from_str(r#"{"recipe_details": "add basil"}"#).unwrap();
        let changes = update.to_changes("now");
        assert!(changes.remove.is_empty());
        assert_eq!(changes.set.get_string("recipe_details"), Some("add basil"));
        assert!(!changes.set.contains("recipe_title"));
    }

    #[test]
    fn updates_refuse_to_null_required_fields() {
        let update: RecipeUpdate = serde_json::from_str(r#"{"recipe_title": null}"#).unwrap();
        assert!(update.validate().is_err());

        let update: RecipeUpdate = serde_json::from_str(r#"{"recipe_date": "yesterday"}"#).unwrap();
        assert!(update.validate().is_err());

        assert!(serde_json::from_str::<RecipeUpdate>(r#"{"SK": "RECIPE#2"}"#).is_err());
        assert!(RecipeUpdate::default().validate().is_ok());
    }

    #[test]
    fn timestamps_have_fixed_width() {
        let now = timestamp();

        assert_eq!(now.len(), "2024-01-05T05:51:02.350000Z".len());
        assert!(now.ends_with('Z'));
    }
}
