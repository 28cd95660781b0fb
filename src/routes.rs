use std::sync::Arc;

use log::{error, warn, Logger};
use warp::http::header::HeaderValue;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Reply, Response};
use warp::Filter;

use crate::environment::Environment;
use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The header carrying the identifier used to tie together the logs of
/// a single request across services.
pub const CORRELATION_HEADER: &str = "correlation-id";

/// The maximum body size to accept. This should be enforced by the
/// HTTP gateway, so on the Rust side it’s set to a generous number.
const MAX_CONTENT_LENGTH: u64 = 64 * 1024;

/// All recipe routes, with errors rendered as JSON and CORS applied.
pub fn make_api(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger.clone();

    make_list_route(environment.clone())
        .or(make_retrieve_route(environment.clone()))
        .or(make_create_route(environment.clone()))
        .or(make_update_route(environment.clone()))
        .or(make_delete_route(environment))
        .recover(move |r| format_rejection(logger.clone(), r))
        .with(cors())
}

fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
        .allow_headers(vec!["authorization", "content-type", CORRELATION_HEADER])
}

/// Renders the handlers' rejections as JSON, with the same
/// `correlation-id` and `server-timing` headers a success carries.
/// Anything else is left to warp.
pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<Response, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?r.context, "correlation_id" => &r.correlation_id, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            warn!(logger, "Rejected request"; "context" => ?r.context, "correlation_id" => &r.correlation_id, "status" => %status, "message" => %r.error);
        }

        let flattened = r.flatten();
        let mut response = with_status(json(&flattened), status).into_response();

        let headers = [
            (CORRELATION_HEADER, Some(r.correlation_id.as_str())),
            (handlers::SERVER_TIMING_HEADER, r.server_timing.as_deref()),
        ];

        for (name, value) in headers.iter() {
            if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
                response.headers_mut().insert(*name, value);
            }
        }

        return Ok(response);
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        InvalidPayload { .. } | InvalidEmail(..) => StatusCode::BAD_REQUEST,
        RecipeNotFound { .. } => StatusCode::NOT_FOUND,
        Store { .. } => StatusCode::BAD_GATEWAY,
        MalformedItem { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use uuid::Uuid;
    use warp::body::{bytes, content_length_limit};
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete, get as g, patch, path as p, path::param as par, post, query};

    use super::{handlers, query as q, CORRELATION_HEADER, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p("api"))
                .and(p("v1"))
                .and(p("recipes"));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    /// Takes the caller's correlation id, or makes one up.
    fn correlation() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
        warp::header::optional::<String>(CORRELATION_HEADER)
            .map(|id: Option<String>| id.unwrap_or_else(|| Uuid::new_v4().to_string()))
    }

    route!(make_list_route => list, rt; end(), g(), query::<q::UserQuery>(), correlation());
    route!(make_retrieve_route => retrieve, rt; par::<String>(), end(), g(), query::<q::UserQuery>(), correlation());
    route!(make_create_route => create, rt; end(), post(), content_length_limit(MAX_CONTENT_LENGTH), bytes(), correlation());
    route!(make_update_route => update, rt; par::<String>(), end(), patch(), query::<q::UserQuery>(), content_length_limit(MAX_CONTENT_LENGTH), bytes(), correlation());
    route!(make_delete_route => delete, rt; par::<String>(), end(), delete(), query::<q::UserQuery>(), correlation());
}
