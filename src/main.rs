use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use warp::Filter;

use log::{info, initialize_logger, warn};
use recipes::config::{get_port, get_variable};
use recipes::environment::Environment;
use recipes::routes;
use recipes::routes::admin::TerminationFunctionWrapper;
use recipes::store::DynamoStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port = get_port("RECIPES_PORT");
    let admin_port = get_port("RECIPES_ADMIN_PORT");
    let table = get_variable("DYNAMODB_TABLE");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port, "table" => &table);
    let logger = Arc::new(logger);

    let store = Arc::new(DynamoStore::from_env(table).await);
    let environment = Environment::new(logger.clone(), store);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate: TerminationFunctionWrapper = {
        let logger = logger.clone();

        Arc::new(move || {
            let termination_sender = termination_sender.clone();
            let logger = logger.clone();

            async move {
                if termination_sender.send(()).await.is_err() {
                    warn!(logger, "Termination already requested");
                }
            }
            .boxed()
        })
    };

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let (_, main_server) = warp::serve(routes::make_api(environment))
            .bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::admin::make_healthz_route()
            .or(routes::admin::make_termination_route(terminate));

        let (_, admin_server) = warp::serve(routes)
            .bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
