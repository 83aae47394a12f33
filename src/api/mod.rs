//! HTTP management API and capture endpoint.
//!
//! # API Endpoints
//!
//! ## `/api/hosts` (POST)
//!
//!   Expects a JSON request body of the form:
//!
//!   ```json
//!   { "amount": 3 }
//!   ```
//!
//!   Where `amount` is between 1 and 50. Returns HTTP 201 (Created) and the
//!   newly minted host records:
//!
//!   ```json
//!   { "data": [ { "id": "01H...", "hostname": "busy-otter-1a2b3c4d.oast.example.com" } ] }
//!   ```
//!
//!   Out-of-range or malformed input returns HTTP 400.
//!
//! ## `/api/http-logs` (GET)
//!
//!   Expects between 1 and 20 repeated `hostId` query parameters (ULIDs).
//!   Returns the capture-log entries for those hosts, with the stored wire
//!   bytes re-parsed into request/response detail and echoed raw as base64:
//!
//!   ```json
//!   { "data": [ { "id": "01H...", "hostId": "01H...", "request": { ... },
//!                 "response": { ... }, "createdAt": "2023-05-01T12:00:00Z" } ] }
//!   ```
//!
//! ## Everything else
//!
//!   Any other request is treated as a captured interaction: the raw request
//!   is recorded against the host owning the request's hostname and a plain
//!   `OK` is returned, or HTTP 404 when no host owns that hostname.
//!
//! Failures are reported as `{"error": {"message": "..."}}`; panics in
//! request handling are recovered and converted to a generic internal error
//! rather than crashing the process.

mod api_error;
mod model;
mod routes;
pub mod server;

pub use server::new;
