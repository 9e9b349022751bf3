// pianoroll_service: HTTP front end for pianoroll sequence generation.
//
// One route, `GET /api/v0/generate?primer=[60,62,64]`, turns an optional list
// of primer pitches into a generated MIDI file and returns it as a download.
//
// Module overview:
// - `config.rs`:   `ServiceConfig`, built once at startup (defaults, JSON
//                  file, CLI overrides) and shared immutably.
// - `primer.rs`:   Pitch-list parsing and primer sequence construction.
// - `window.rs`:   The absolute time window to generate, anchored to the end
//                  of the primer.
// - `invoke.rs`:   Runs the generator `num_outputs` times and writes each
//                  result to a timestamped MIDI file.
// - `context.rs`:  `ServiceContext`: config + generator + encoder, and the
//                  primer -> window -> invoke pipeline for one request.
// - `endpoint.rs`: Request-level behavior independent of the HTTP library:
//                  file download or the "File not found" JSON.
// - `server.rs`:   tiny_http listener with a fixed pool of worker threads.
// - `logging.rs`:  tracing-subscriber setup from the configured verbosity.
// - `error.rs`:    `ServiceError` and the primer/window error values.
//
// Requests run synchronously on the worker thread that accepted them; the
// generator and encoder are shared across workers behind `Arc`.

pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod invoke;
pub mod logging;
pub mod primer;
pub mod server;
pub mod window;

#[cfg(test)]
mod test_support;

pub use config::ServiceConfig;
pub use context::ServiceContext;
pub use error::{PrimerParseError, Result, ServiceError, WindowError};
pub use server::{GENERATE_ROUTE, ServerHandle, start_server};
