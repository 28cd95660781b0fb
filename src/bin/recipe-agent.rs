use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use structopt::StructOpt;

use log::{debug, info, initialize_logger};
use recipes::agent::{handle_event, AgentEvent};
use recipes::config::get_variable;
use recipes::store::DynamoStore;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "recipe-agent",
    about = "Answer a chatbot action group invocation from the recipes table"
)]
struct Opt {
    /// The file holding the invocation as JSON (stdin if omitted)
    #[structopt(parse(from_os_str))]
    event: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let raw = match &opt.event {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let event: AgentEvent = serde_json::from_str(&raw)?;
    debug!(logger, "Read event"; "action_group" => &event.action_group, "function" => &event.function);

    let store = Arc::new(DynamoStore::from_env(get_variable("DYNAMODB_TABLE")).await);
    let response = handle_event(&logger, store, &event).await?;

    println!("{}", serde_json::to_string(&response)?);
    info!(logger, "Answered invocation");

    Ok(())
}
