//! A helper program to create the recipes table for local testing.

use std::env;

use log::{debug, info, initialize_logger};
use recipes::store::DynamoStore;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let table = env::var("DYNAMODB_TABLE").expect("could not read DYNAMODB_TABLE");

    debug!(logger, "Connecting to DynamoDB..."; "table" => &table);

    let store = DynamoStore::from_env(table).await;

    let created = store
        .create_table_if_not_exists()
        .await
        .expect("failed to create table");

    if created {
        info!(logger, "Created table"; "table" => store.table());
    } else {
        info!(logger, "Table already exists"; "table" => store.table());
    }

    debug!(logger, "Completed initialization.");
}
