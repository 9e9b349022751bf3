// Endpoint behavior for `GET /api/v0/generate`, independent of the HTTP
// library.
//
// Outcomes:
// - an output file that was read back: `EndpointResponse::File` with the
//   bytes this request wrote and the final path segment as the download name;
// - no file, or a failed read-back: `EndpointResponse::NotFound`, served as
//   400 with a fixed JSON body;
// - any pipeline error (malformed primer, generator or encoder failure):
//   `Err`, which the server reports as an unhandled 500.

use crate::context::ServiceContext;
use crate::error::Result;
use crate::invoke::GeneratedFile;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const NOT_FOUND_STATUS: u16 = 400;
pub const NOT_FOUND_MESSAGE: &str = "File not found";

/// JSON body of the "File not found" response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

impl ErrorBody {
    pub fn not_found() -> Self {
        ErrorBody {
            status: NOT_FOUND_STATUS,
            message: NOT_FOUND_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointResponse {
    File { filename: String, body: Vec<u8> },
    NotFound,
}

pub fn handle_generate(ctx: &ServiceContext, primer: Option<&str>) -> Result<EndpointResponse> {
    debug!(primer = ?primer, "generate request");
    Ok(match ctx.generate_from_primer(primer)? {
        Some(GeneratedFile {
            path,
            contents: Some(body),
        }) => EndpointResponse::File {
            filename: download_name(&path),
            body,
        },
        _ => EndpointResponse::NotFound,
    })
}

/// Final path segment, splitting on both `/` and `\`.
pub fn download_name(path: &Path) -> String {
    let text = path.to_string_lossy();
    text.rsplit(['/', '\\']).next().unwrap_or_default().to_string()
}
