use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{info, o, Logger};
use warp::{
    reject,
    reply::{json, with_header, Json, Reply},
};

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::normalization::validate_email;
use crate::recipe::{NewRecipe, RecipeUpdate};
use crate::recipes::Recipes;
use crate::routes::{
    query::UserQuery,
    rejection::{Context, Rejection},
    response::SuccessResponse,
    CORRELATION_HEADER,
};

pub const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

/// Runs the handler body, then attaches the `server-timing` and
/// `correlation-id` headers. Rejections carry the timing along so that
/// `format_rejection` can add the same headers to error replies.
macro_rules! timed {
    ($correlation_id:expr, { $($body:tt)* }) => {{
        let start = Instant::now();

        let result: Result<Json, Rejection> = async { $($body)* }.await;
        let server_timing = format_server_timing(start.elapsed());

        match result {
            Ok(reply) => {
                let reply = with_header(reply, SERVER_TIMING_HEADER, server_timing);

                Ok(Box::new(with_header(reply, CORRELATION_HEADER, $correlation_id)) as Box<dyn Reply>)
            }
            Err(rejection) => Err(reject::custom(rejection.with_server_timing(server_timing))),
        }
    }};
}

pub async fn list(
    environment: Environment,
    query: UserQuery,
    correlation_id: String,
) -> RouteResult {
    timed!(correlation_id.clone(), {
        let UserQuery { user_email } = query;
        let error_handler =
            |e: BackendError| Rejection::new(Context::list(user_email.clone()), &correlation_id, e);

        let logger = request_logger(&environment, &correlation_id, &user_email);
        info!(logger, "Starting recipes handler for list");

        validate_email(&user_email).map_err(error_handler)?;

        let recipes = Recipes::new(&logger, environment.store.clone(), user_email.clone());
        let all = recipes.list().await.map_err(error_handler)?;

        info!(logger, "Finished list successfully");
        Ok(json(&SuccessResponse::Recipes(all)))
    })
}

pub async fn retrieve(
    environment: Environment,
    id: String,
    query: UserQuery,
    correlation_id: String,
) -> RouteResult {
    timed!(correlation_id.clone(), {
        let error_handler =
            |e: BackendError| Rejection::new(Context::retrieve(id.clone()), &correlation_id, e);

        let logger = request_logger(&environment, &correlation_id, &query.user_email);
        info!(logger, "Starting recipes handler for retrieve"; "id" => &id);

        validate_email(&query.user_email).map_err(error_handler)?;

        let recipes = Recipes::new(&logger, environment.store.clone(), query.user_email);
        let recipe = recipes.get(&id).await.map_err(error_handler)?;

        info!(logger, "Finished retrieve successfully");
        Ok(json(&SuccessResponse::from(recipe)))
    })
}

pub async fn create(environment: Environment, body: Bytes, correlation_id: String) -> RouteResult {
    timed!(correlation_id.clone(), {
        let new_recipe = serde_json::from_slice::<NewRecipe>(&body)
            .map_err(BackendError::from)
            .map_err(|e| Rejection::new(Context::create(None), &correlation_id, e))?;

        let user_email = new_recipe.user_email.clone();
        let error_handler = |e: BackendError| {
            Rejection::new(Context::create(Some(user_email.clone())), &correlation_id, e)
        };

        new_recipe.validate().map_err(error_handler)?;

        let logger = request_logger(&environment, &correlation_id, &user_email);
        info!(logger, "Starting recipes handler for create");

        let recipes = Recipes::new(&logger, environment.store.clone(), user_email.clone());
        let recipe = recipes.create(new_recipe).await.map_err(error_handler)?;

        info!(logger, "Finished create successfully"; "id" => recipe.id());
        Ok(json(&SuccessResponse::Recipe(recipe)))
    })
}

pub async fn update(
    environment: Environment,
    id: String,
    query: UserQuery,
    body: Bytes,
    correlation_id: String,
) -> RouteResult {
    timed!(correlation_id.clone(), {
        let error_handler =
            |e: BackendError| Rejection::new(Context::update(id.clone()), &correlation_id, e);

        let logger = request_logger(&environment, &correlation_id, &query.user_email);
        info!(logger, "Starting recipes handler for update"; "id" => &id);

        validate_email(&query.user_email).map_err(error_handler)?;

        let update = serde_json::from_slice::<RecipeUpdate>(&body)
            .map_err(BackendError::from)
            .map_err(error_handler)?;
        update.validate().map_err(error_handler)?;

        let recipes = Recipes::new(&logger, environment.store.clone(), query.user_email);
        let recipe = recipes.update(&id, update).await.map_err(error_handler)?;

        info!(logger, "Finished update successfully");
        Ok(json(&SuccessResponse::Recipe(recipe)))
    })
}

pub async fn delete(
    environment: Environment,
    id: String,
    query: UserQuery,
    correlation_id: String,
) -> RouteResult {
    timed!(correlation_id.clone(), {
        let error_handler =
            |e: BackendError| Rejection::new(Context::delete(id.clone()), &correlation_id, e);

        let logger = request_logger(&environment, &correlation_id, &query.user_email);
        info!(logger, "Starting recipes handler for delete"; "id" => &id);

        validate_email(&query.user_email).map_err(error_handler)?;

        let recipes = Recipes::new(&logger, environment.store.clone(), query.user_email);
        recipes.delete(&id).await.map_err(error_handler)?;

        info!(logger, "Finished delete successfully");
        Ok(json(&SuccessResponse::Empty {}))
    })
}

/// Every line logged while handling a request carries these keys, so
/// the request can be followed across services.
fn request_logger(environment: &Environment, correlation_id: &str, user_email: &str) -> Logger {
    environment.logger.new(o!(
        "correlation_id" => correlation_id.to_owned(),
        "user_email" => user_email.to_owned(),
    ))
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
