//! HTTP front end for the operation catalog.
//!
//! Routes:
//! - `GET /health`
//! - `GET /v1/operations` lists the catalog
//! - `POST /v1/operations/{name}` runs an operation with a JSON parameter
//!   object as the body; `GET` is accepted for parameterless calls
//!
//! Known operations always answer 200 with an [`OperationResponse`], whether
//! or not they succeeded. Unknown operations answer 404 and unusable
//! parameters 400, both with an [`OperationResponse`] body.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use composegraph_core::catalog::{self, CatalogError, Operation, OperationResponse};
use composegraph_core::QueryService;
use composegraph_store::GraphStore;
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, info, warn};

const OPERATIONS_PREFIX: &str = "/v1/operations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Health,
    Catalog,
    Operation(&'a str),
}

/// Parse a request URL into a route. Query strings are ignored.
pub fn parse_route(url: &str) -> Option<Route<'_>> {
    let path = url.split('?').next().unwrap_or(url);
    if path == "/health" {
        return Some(Route::Health);
    }
    let rest = path.strip_prefix(OPERATIONS_PREFIX)?;
    match rest {
        "" | "/" => Some(Route::Catalog),
        _ => {
            let name = rest.strip_prefix('/')?;
            if name.is_empty() || name.contains('/') {
                None
            } else {
                Some(Route::Operation(name))
            }
        }
    }
}

/// HTTP status for a catalog parse failure.
pub fn status_for(error: &CatalogError) -> u16 {
    match error {
        CatalogError::UnknownOperation(_) => 404,
        CatalogError::InvalidParameters { .. } => 400,
    }
}

fn respond_err(req: tiny_http::Request, code: u16, msg: &str) {
    let _ = req.respond(Response::from_string(msg).with_status_code(StatusCode(code)));
}

fn respond_json(req: tiny_http::Request, code: u16, body: &impl Serialize) {
    let json = match serde_json::to_vec(body) {
        Ok(json) => json,
        Err(e) => {
            respond_err(req, 500, &format!("serialization error: {e}"));
            return;
        }
    };
    let header = Header::from_bytes("Content-Type", "application/json").expect("valid header");
    let _ = req.respond(
        Response::from_data(json)
            .with_header(header)
            .with_status_code(StatusCode(code)),
    );
}

fn read_body(req: &mut tiny_http::Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    if req.as_reader().read_to_end(&mut body).is_ok() {
        Some(body)
    } else {
        None
    }
}

/// Decode a request body into catalog parameters. An empty body means no
/// parameters.
fn decode_params(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
}

fn handle_operation(
    queries: &QueryService<'_>,
    mut req: tiny_http::Request,
    method: &Method,
    name: &str,
) {
    let params = match *method {
        Method::Post => {
            let Some(body) = read_body(&mut req) else {
                respond_err(req, 500, "read error");
                return;
            };
            match decode_params(&body) {
                Ok(params) => params,
                Err(e) => {
                    warn!("{name}: malformed request body: {e}");
                    let response =
                        OperationResponse::failure(name, format!("malformed request body: {e}"));
                    respond_json(req, 400, &response);
                    return;
                }
            }
        }
        Method::Get => Value::Null,
        _ => {
            respond_err(req, 405, "method not allowed");
            return;
        }
    };

    match Operation::parse(name, &params) {
        Ok(operation) => {
            let response = catalog::respond(queries, &operation);
            info!("{name}: ok={}", response.ok);
            respond_json(req, 200, &response);
        }
        Err(e) => {
            warn!("{name}: {e}");
            respond_json(req, status_for(&e), &OperationResponse::failure(name, e));
        }
    }
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(queries: &QueryService<'_>, req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    match parse_route(&url) {
        Some(Route::Health) if method == Method::Get => {
            respond_json(req, 200, &serde_json::json!({ "status": "ok" }));
        }
        Some(Route::Catalog) if method == Method::Get => {
            respond_json(req, 200, &catalog::listing());
        }
        Some(Route::Operation(name)) => handle_operation(queries, req, &method, name),
        Some(_) => respond_err(req, 405, "method not allowed"),
        None => respond_err(req, 404, "not found"),
    }
}

/// Start the server loop, blocking the current thread.
pub fn run_server(
    store: &dyn GraphStore,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::http(addr)?;
    info!("listening on {addr} ({} store)", store.name());
    let queries = QueryService::new(store);
    for request in server.incoming_requests() {
        handle_request(&queries, request);
    }
    Ok(())
}

/// A test helper that serves a graph store on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}`. Dropping the `TestServer`
/// unblocks the accept loop.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start(store: Arc<dyn GraphStore>) -> Self {
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let srv = Arc::clone(&server);
        let handle = std::thread::spawn(move || {
            let queries = QueryService::new(store.as_ref());
            for request in srv.incoming_requests() {
                handle_request(&queries, request);
            }
        });

        Self {
            url,
            port,
            server,
            _handle: handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}
