//! HTTP tool provider serving the arithmetic tools
//!
//! Endpoints:
//! - `GET /health`
//! - `GET /tools` lists the tool definitions
//! - `POST /tools/call` with `{"tool_name", "arguments"}`
//! - `POST /tools/<name>` with the arguments as the body
use bytes::Bytes;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tally::errors::{RegistryError, ToolError};
use tally::invoker::ToolInvoker;
use tally::math::math_registry;
use tally::registry::ToolRegistry;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

pub const SERVICE_NAME: &str = "tally math tools";

#[derive(Serialize)]
struct ToolListing {
    name: String,
    description: String,
    input_schema: Value,
}

/// All routes of the tool server, backed by the given registry
pub fn routes(
    registry: Arc<ToolRegistry>,
) -> impl Filter<Extract = (WithStatus<Json>,), Error = warp::Rejection> + Clone {
    let invoker = ToolInvoker::new(registry);

    let health = warp::path!("health").and(warp::get()).map(|| {
        reply(
            StatusCode::OK,
            json!({"status": "healthy", "service": SERVICE_NAME}),
        )
    });

    let list = warp::path!("tools")
        .and(warp::get())
        .and(with_invoker(invoker.clone()))
        .map(|invoker: ToolInvoker| {
            info!("listing available tools");
            let tools: Vec<ToolListing> = invoker
                .registry()
                .describe_all()
                .into_iter()
                .map(|tool| ToolListing {
                    input_schema: tool.input_schema(),
                    name: tool.name,
                    description: tool.description,
                })
                .collect();
            reply(StatusCode::OK, json!({ "tools": tools }))
        });

    let call = warp::path!("tools" / "call")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_invoker(invoker.clone()))
        .and_then(call_tool);

    let direct = warp::path!("tools" / String)
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_invoker(invoker))
        .and_then(call_tool_direct);

    health.or(list).unify().or(call).unify().or(direct).unify()
}

/// Routes over the built-in arithmetic tools
pub fn math_routes() -> Result<
    impl Filter<Extract = (WithStatus<Json>,), Error = warp::Rejection> + Clone,
    RegistryError,
> {
    Ok(routes(Arc::new(math_registry()?)))
}

fn with_invoker(
    invoker: ToolInvoker,
) -> impl Filter<Extract = (ToolInvoker,), Error = Infallible> + Clone {
    warp::any().map(move || invoker.clone())
}

fn reply(status: StatusCode, body: Value) -> WithStatus<Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn parse_body(body: &Bytes) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<Value>(body)
        .ok()
        .filter(|value| !value.is_null())
}

fn no_body() -> WithStatus<Json> {
    reply(
        StatusCode::BAD_REQUEST,
        json!({"error": "No JSON data provided", "success": false}),
    )
}

async fn call_tool(body: Bytes, invoker: ToolInvoker) -> Result<WithStatus<Json>, Infallible> {
    let Some(data) = parse_body(&body) else {
        return Ok(no_body());
    };

    let Some(tool_name) = data.get("tool_name").and_then(|n| n.as_str()) else {
        return Ok(reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "tool_name is required", "success": false}),
        ));
    };
    let arguments = data
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    Ok(execute(&invoker, tool_name, arguments).await)
}

async fn call_tool_direct(
    tool_name: String,
    body: Bytes,
    invoker: ToolInvoker,
) -> Result<WithStatus<Json>, Infallible> {
    let Some(arguments) = parse_body(&body) else {
        return Ok(no_body());
    };

    Ok(execute(&invoker, &tool_name, arguments).await)
}

async fn execute(invoker: &ToolInvoker, tool_name: &str, arguments: Value) -> WithStatus<Json> {
    info!(tool = tool_name, %arguments, "tool call request");

    match invoker.call(tool_name, &arguments).await {
        Ok(result) => {
            info!(tool = tool_name, %result, "tool executed successfully");
            reply(
                StatusCode::OK,
                json!({
                    "tool_name": tool_name,
                    "arguments": arguments,
                    "result": result,
                    "success": true,
                }),
            )
        }
        Err(ToolError::NotFound { name, available }) => reply(
            StatusCode::NOT_FOUND,
            json!({
                "error": format!("Tool '{}' not found", name),
                "available_tools": available,
            }),
        ),
        Err(e @ ToolError::InvalidArguments { .. }) => {
            error!(tool = tool_name, error = %e, "invalid arguments");
            reply(
                StatusCode::BAD_REQUEST,
                json!({"error": e.to_string(), "success": false}),
            )
        }
        Err(e) => {
            error!(tool = tool_name, error = %e, "error executing tool");
            let message = match e {
                ToolError::Execution(message) => message,
                other => other.to_string(),
            };
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": message, "success": false}),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::test::request;

    fn app() -> impl Filter<Extract = (WithStatus<Json>,), Error = warp::Rejection> + Clone {
        math_routes().unwrap()
    }

    fn body(response: &warp::http::Response<Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = request().method("GET").path("/health").reply(&app()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_tools() {
        let response = request().method("GET").path("/tools").reply(&app()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body(&response);
        let names: Vec<&str> = body["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["add", "subtract", "multiply"]);
        assert_eq!(
            body["tools"][1]["input_schema"]["properties"]["a"]["description"],
            "First number (minuend)"
        );
        assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_call_tool() {
        let response = request()
            .method("POST")
            .path("/tools/call")
            .json(&json!({"tool_name": "add", "arguments": {"a": 15, "b": 27}}))
            .reply(&app())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body(&response);
        assert_eq!(body["result"], json!(42));
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["arguments"], json!({"a": 15, "b": 27}));
    }

    #[tokio::test]
    async fn test_call_tool_direct() {
        let response = request()
            .method("POST")
            .path("/tools/subtract")
            .json(&json!({"a": 10, "b": 4.5}))
            .reply(&app())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["result"], json!(5.5));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let response = request()
            .method("POST")
            .path("/tools/call")
            .json(&json!({"tool_name": "divide", "arguments": {"a": 1, "b": 2}}))
            .reply(&app())
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body(&response);
        assert_eq!(body["error"], "Tool 'divide' not found");
        assert_eq!(body["available_tools"], json!(["add", "subtract", "multiply"]));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let response = request()
            .method("POST")
            .path("/tools/multiply")
            .json(&json!({"a": 3}))
            .reply(&app())
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body(&response);
        assert_eq!(body["success"], json!(false));
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid arguments: missing required parameter(s): b"));
    }

    #[tokio::test]
    async fn test_missing_body() {
        let routes = app();
        let response = request().method("POST").path("/tools/call").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&response)["error"], "No JSON data provided");

        let response = request()
            .method("POST")
            .path("/tools/add")
            .body("null")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_execution_error() {
        let response = request()
            .method("POST")
            .path("/tools/call")
            .json(&json!({"tool_name": "multiply", "arguments": {"a": 1e308, "b": 10}}))
            .reply(&app())
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body(&response)["error"]
            .as_str()
            .unwrap()
            .contains("not a finite number"));
    }
}
