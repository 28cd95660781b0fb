use std::collections::HashMap;

use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use futures::future::{BoxFuture, FutureExt};

use crate::errors::BackendError;
use crate::keys::{PARTITION_KEY, SORT_KEY};

pub mod memory;

/// A raw item as the table stores it: attribute names mapped to typed
/// values (`{"S": "..."}` for strings).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Item {
    attributes: HashMap<String, AttributeValue>,
}

impl Item {
    /// Creates a new empty `Item`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a string attribute.
    pub fn set_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into(), AttributeValue::S(value.into()));
        self
    }

    /// Sets a string attribute only if a value is present, leaving the
    /// item sparse otherwise.
    pub fn set_optional_string(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.set_string(name, value),
            None => self,
        }
    }

    /// Gets the value of an attribute as a string.
    ///
    /// Returns `None` if the attribute doesn't exist or is not a string.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|value| value.as_s().ok())
            .map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn into_attributes(self) -> HashMap<String, AttributeValue> {
        self.attributes
    }
}

impl From<HashMap<String, AttributeValue>> for Item {
    fn from(attributes: HashMap<String, AttributeValue>) -> Self {
        Item { attributes }
    }
}

/// A partial modification of an existing item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Changes {
    /// Attributes to overwrite.
    pub set: Item,

    /// Attributes to delete from the item.
    pub remove: Vec<String>,
}

/// A table addressed by a partition key and a sort key.
pub trait Store: Send + Sync {
    /// Returns every item in the partition whose sort key starts with
    /// `sort_key_prefix`, in sort key order.
    fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
    ) -> BoxFuture<Result<Vec<Item>, BackendError>>;

    /// Looks up a single item. A missing item is not an error.
    fn get(&self, partition_key: &str, sort_key: &str) -> BoxFuture<Result<Option<Item>, BackendError>>;

    /// Writes the item, replacing any item with the same key.
    fn put(&self, item: Item) -> BoxFuture<Result<(), BackendError>>;

    /// Applies `changes` to an existing item. Never creates an item;
    /// returns `false` if there was nothing to update.
    fn update(
        &self,
        partition_key: &str,
        sort_key: &str,
        changes: Changes,
    ) -> BoxFuture<Result<bool, BackendError>>;

    /// Deletes the item. Deleting a missing item succeeds.
    fn delete(&self, partition_key: &str, sort_key: &str) -> BoxFuture<Result<(), BackendError>>;
}

/// A store backed by a DynamoDB table with string `PK` and `SK` keys.
pub struct DynamoStore {
    client: Client,
    table: String,
}

impl DynamoStore {
    /// Creates a new instance.
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Builds the client from the AWS environment (credentials, region)
    /// and `ENDPOINT_URL`, if set, for a local DynamoDB.
    pub async fn from_env(table: impl Into<String>) -> Self {
        use std::env;

        let sdk_config = aws_config::load_from_env().await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);

        if let Ok(endpoint) = env::var("ENDPOINT_URL") {
            builder = builder.endpoint_url(endpoint);
        }

        Self::new(Client::from_conf(builder.build()), table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn key(partition_key: &str, sort_key: &str) -> HashMap<String, AttributeValue> {
        Item::new()
            .set_string(PARTITION_KEY, partition_key)
            .set_string(SORT_KEY, sort_key)
            .into_attributes()
    }

    /// Creates the table unless it already exists. Returns whether it
    /// was created.
    pub async fn create_table_if_not_exists(&self) -> Result<bool, BackendError> {
        match self.client.describe_table().table_name(&self.table).send().await {
            Ok(_) => return Ok(false),
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false);

                if !missing {
                    return Err(BackendError::store("describe_table", DisplayErrorContext(&e)));
                }
            }
        }

        let mut attribute_definitions = vec![];
        let mut key_schema = vec![];

        for (name, key_type) in &[(PARTITION_KEY, KeyType::Hash), (SORT_KEY, KeyType::Range)] {
            attribute_definitions.push(
                AttributeDefinition::builder()
                    .attribute_name(*name)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(|e| BackendError::store("create_table", e))?,
            );
            key_schema.push(
                KeySchemaElement::builder()
                    .attribute_name(*name)
                    .key_type(key_type.clone())
                    .build()
                    .map_err(|e| BackendError::store("create_table", e))?,
            );
        }

        self.client
            .create_table()
            .table_name(&self.table)
            .billing_mode(BillingMode::PayPerRequest)
            .set_attribute_definitions(Some(attribute_definitions))
            .set_key_schema(Some(key_schema))
            .send()
            .await
            .map_err(|e| BackendError::store("create_table", DisplayErrorContext(&e)))?;

        Ok(true)
    }
}

// these can be simplified once async functions in traits are usable
// behind `dyn`
impl Store for DynamoStore {
    fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
    ) -> BoxFuture<Result<Vec<Item>, BackendError>> {
        let partition_key = partition_key.to_owned();
        let sort_key_prefix = sort_key_prefix.to_owned();

        async move {
            let mut items = Vec::new();
            let mut last_evaluated_key = None;

            // the table hands back at most 1 MB per page
            loop {
                let response = self
                    .client
                    .query()
                    .table_name(&self.table)
                    .key_condition_expression("#pk = :pk AND begins_with(#sk, :prefix)")
                    .expression_attribute_names("#pk", PARTITION_KEY)
                    .expression_attribute_names("#sk", SORT_KEY)
                    .expression_attribute_values(":pk", AttributeValue::S(partition_key.clone()))
                    .expression_attribute_values(
                        ":prefix",
                        AttributeValue::S(sort_key_prefix.clone()),
                    )
                    .set_exclusive_start_key(last_evaluated_key)
                    .send()
                    .await
                    .map_err(|e| BackendError::store("query", DisplayErrorContext(&e)))?;

                items.extend(response.items.unwrap_or_default().into_iter().map(Item::from));

                last_evaluated_key = response.last_evaluated_key;

                if last_evaluated_key.is_none() {
                    break;
                }
            }

            Ok(items)
        }
        .boxed()
    }

    fn get(&self, partition_key: &str, sort_key: &str) -> BoxFuture<Result<Option<Item>, BackendError>> {
        let key = Self::key(partition_key, sort_key);

        async move {
            let response = self
                .client
                .get_item()
                .table_name(&self.table)
                .set_key(Some(key))
                .send()
                .await
                .map_err(|e| BackendError::store("get_item", DisplayErrorContext(&e)))?;

            Ok(response.item.map(Item::from))
        }
        .boxed()
    }

    fn put(&self, item: Item) -> BoxFuture<Result<(), BackendError>> {
        async move {
            self.client
                .put_item()
                .table_name(&self.table)
                .set_item(Some(item.into_attributes()))
                .send()
                .await
                .map_err(|e| BackendError::store("put_item", DisplayErrorContext(&e)))?;

            Ok(())
        }
        .boxed()
    }

    fn update(
        &self,
        partition_key: &str,
        sort_key: &str,
        changes: Changes,
    ) -> BoxFuture<Result<bool, BackendError>> {
        let key = Self::key(partition_key, sort_key);

        async move {
            let expression = UpdateExpression::from(changes);

            let result = self
                .client
                .update_item()
                .table_name(&self.table)
                .set_key(Some(key))
                .update_expression(expression.text)
                .condition_expression("attribute_exists(#pk)")
                .set_expression_attribute_names(Some(expression.names))
                .expression_attribute_names("#pk", PARTITION_KEY)
                .set_expression_attribute_values(if expression.values.is_empty() {
                    None
                } else {
                    Some(expression.values)
                })
                .send()
                .await;

            match result {
                Ok(_) => Ok(true),
                Err(e) => {
                    let missing = e
                        .as_service_error()
                        .map(|e| e.is_conditional_check_failed_exception())
                        .unwrap_or(false);

                    if missing {
                        Ok(false)
                    } else {
                        Err(BackendError::store("update_item", DisplayErrorContext(&e)))
                    }
                }
            }
        }
        .boxed()
    }

    fn delete(&self, partition_key: &str, sort_key: &str) -> BoxFuture<Result<(), BackendError>> {
        let key = Self::key(partition_key, sort_key);

        async move {
            self.client
                .delete_item()
                .table_name(&self.table)
                .set_key(Some(key))
                .send()
                .await
                .map_err(|e| BackendError::store("delete_item", DisplayErrorContext(&e)))?;

            Ok(())
        }
        .boxed()
    }
}

/// An `UpdateItem` expression with placeholders for every attribute
/// name and value.
#[derive(Debug, PartialEq)]
struct UpdateExpression {
    text: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl From<Changes> for UpdateExpression {
    fn from(changes: Changes) -> Self {
        let mut names = HashMap::new();
        let mut values = HashMap::new();

        // sorted so the expression is stable
        let mut set: Vec<_> = changes.set.into_attributes().into_iter().collect();
        set.sort_by(|a, b| a.0.cmp(&b.0));

        let assignments = set
            .into_iter()
            .enumerate()
            .map(|(i, (name, value))| {
                let name_placeholder = format!("#set{}", i);
                let value_placeholder = format!(":set{}", i);
                let assignment = format!("{} = {}", name_placeholder, value_placeholder);

                names.insert(name_placeholder, name);
                values.insert(value_placeholder, value);

                assignment
            })
            .collect::<Vec<_>>();

        let removals = changes
            .remove
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let placeholder = format!("#remove{}", i);
                names.insert(placeholder.clone(), name);
                placeholder
            })
            .collect::<Vec<_>>();

        let mut clauses = vec![];

        if !assignments.is_empty() {
            clauses.push(format!("SET {}", assignments.join(", ")));
        }

        if !removals.is_empty() {
            clauses.push(format!("REMOVE {}", removals.join(", ")));
        }

        UpdateExpression {
            text: clauses.join(" "),
            names,
            values,
        }
    }
}
