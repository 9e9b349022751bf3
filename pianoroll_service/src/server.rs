// HTTP listener and worker pool.
//
// Architecture: one `tiny_http::Server` shared by `worker_threads` threads.
// Each worker polls `recv_timeout` and runs the whole request (primer parse,
// generation, MIDI write, file read) on its own thread before responding, so
// slow generations only block the worker that accepted them.
//
// Routing is a single match on the path:
// - `GENERATE_ROUTE` with GET: the generate endpoint.
// - `GENERATE_ROUTE` with any other method: 405.
// - anything else: 404.
//
// Shutdown: workers check a shared `keep_running` flag between polls.
// `ServerHandle::stop` clears it and joins them.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

use crate::context::ServiceContext;
use crate::endpoint::{EndpointResponse, ErrorBody, handle_generate};
use crate::error::{Result, ServiceError};

/// Path of the only route the service exposes.
pub const GENERATE_ROUTE: &str = "/api/v0/generate";

/// How long a worker waits for a request before rechecking `keep_running`.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type HttpResponse = Response<Cursor<Vec<u8>>>;

/// Handle returned by `start_server` to control the running workers.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal the workers to stop and wait for them to finish their current
    /// request.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until every worker exits. Without a `stop` from elsewhere this
    /// runs for the life of the process.
    pub fn join(self) {
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

/// Bind the configured host and port and start the worker pool. Returns the
/// handle and the actual bound address (port 0 lets the OS pick).
pub fn start_server(ctx: ServiceContext) -> Result<(ServerHandle, SocketAddr)> {
    let bind = format!("{}:{}", ctx.config().host, ctx.config().port);
    let server = Server::http(bind.as_str())
        .map_err(|err| ServiceError::Server(format!("cannot bind {bind}: {err}")))?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| ServiceError::Server(format!("{bind} is not an IP listener")))?;

    let server = Arc::new(server);
    let keep_running = Arc::new(AtomicBool::new(true));
    let mut workers = Vec::with_capacity(ctx.config().worker_threads);
    for index in 0..ctx.config().worker_threads {
        let server = server.clone();
        let ctx = ctx.clone();
        let keep_running = keep_running.clone();
        let worker = thread::Builder::new()
            .name(format!("http-worker-{index}"))
            .spawn(move || run_worker(&server, &ctx, &keep_running))
            .map_err(|err| ServiceError::Server(format!("cannot spawn worker: {err}")))?;
        workers.push(worker);
    }

    info!(%addr, workers = workers.len(), "listening");
    Ok((
        ServerHandle {
            keep_running,
            workers,
        },
        addr,
    ))
}

fn run_worker(server: &Server, ctx: &ServiceContext, keep_running: &AtomicBool) {
    while keep_running.load(Ordering::SeqCst) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => handle_request(ctx, request),
            Ok(None) => {}
            Err(err) => {
                error!(error = %err, "listener failed");
                break;
            }
        }
    }
}

fn handle_request(ctx: &ServiceContext, request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let response = route(ctx, &method, &url);
    info!(%method, %url, status = response.status_code().0, "request");
    if let Err(err) = request.respond(response) {
        warn!(error = %err, "failed to send response");
    }
}

fn route(ctx: &ServiceContext, method: &Method, url: &str) -> HttpResponse {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    if path != GENERATE_ROUTE {
        return text_response(404, "Not Found");
    }
    if *method != Method::Get {
        return with_header(text_response(405, "Method Not Allowed"), "Allow", "GET");
    }

    let primer = query_param(query, "primer");
    match handle_generate(ctx, primer.as_deref()) {
        Ok(EndpointResponse::File { filename, body }) => midi_response(&filename, body),
        Ok(EndpointResponse::NotFound) => json_response(&ErrorBody::not_found()),
        Err(err) => {
            error!(error = %err, "generate request failed");
            text_response(500, "Internal Server Error")
        }
    }
}

fn midi_response(filename: &str, body: Vec<u8>) -> HttpResponse {
    let response = Response::from_data(body);
    let response = with_header(response, "Content-Type", "audio/midi");
    with_header(
        response,
        "Content-Disposition",
        &format!("attachment; filename=\"{filename}\""),
    )
}

fn json_response(body: &ErrorBody) -> HttpResponse {
    let data = serde_json::to_vec(body).unwrap_or_default();
    let response = Response::from_data(data).with_status_code(StatusCode(body.status));
    with_header(response, "Content-Type", "application/json")
}

fn text_response(status: u16, body: &str) -> HttpResponse {
    let response = Response::from_data(body.as_bytes().to_vec()).with_status_code(StatusCode(status));
    with_header(response, "Content-Type", "text/plain; charset=utf-8")
}

fn with_header(response: HttpResponse, name: &str, value: &str) -> HttpResponse {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => {
            debug!(name, value, "dropping invalid header");
            response
        }
    }
}

/// First value of `name` in a URL query string, percent-decoded.
fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| percent_decode(key) == name)
        .map(|(_, value)| percent_decode(value))
}

/// Decode `%XX` escapes and `+` as space. Malformed escapes pass through
/// unchanged; invalid UTF-8 is replaced.
fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
