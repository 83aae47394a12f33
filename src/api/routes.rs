use crate::api::api_error::APIError;
use crate::api::model::{decode_capture_entry, ApiData, CaptureEntryView, CreateHostsRequest};
use crate::api::server::AppState;
use crate::error::Error;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, request, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use ulid::Ulid;

pub(super) fn new(state: AppState) -> Router {
    Router::new()
        .route("/api/hosts", post(create_hosts))
        .route("/api/http-logs", get(list_capture_entries))
        .fallback(capture)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

async fn create_hosts(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateHostsRequest>, APIError>,
) -> Result<impl IntoResponse, APIError> {
    payload.validate()?;
    let hosts = state.hosts.create_hosts(payload.amount).await?;
    Ok((StatusCode::CREATED, Json(ApiData { data: hosts })))
}

async fn list_capture_entries(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<ApiData<Vec<CaptureEntryView>>>, APIError> {
    let host_ids = parse_host_ids(&params)?;
    let entries = state.hosts.list_capture_entries(&host_ids).await?;
    let data = entries
        .iter()
        .map(decode_capture_entry)
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(Json(ApiData { data }))
}

fn parse_host_ids(params: &[(String, String)]) -> Result<Vec<Ulid>, Error> {
    let mut host_ids = Vec::new();
    for (key, value) in params {
        if key != "hostId" {
            continue;
        }
        let host_id = Ulid::from_string(value)
            .map_err(|err| Error::InvalidHostId(format!("{value}: {err}")))?;
        host_ids.push(host_id);
    }
    Ok(host_ids)
}

/// Fallback for every non-API request: record it against the host owning the
/// request's hostname.
async fn capture(State(state): State<AppState>, request: Request<Body>) -> Response {
    match store_capture(&state, request).await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(Error::HostNotFound) => {
            tracing::debug!("host not found, ignoring incoming request");
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
        Err(err) => APIError::from(err).into_response(),
    }
}

async fn store_capture(state: &AppState, request: Request<Body>) -> Result<(), Error> {
    let (parts, body) = request.into_parts();
    let body = hyper::body::to_bytes(body).await?;

    let hostname = parts
        .headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| parts.uri.host().map(str::to_owned))
        .ok_or(Error::HostNotFound)?;

    let raw_request = dump_request(&parts, &body);
    state
        .hosts
        .store_capture_entry(&hostname, raw_request, dump_ok_response())
        .await?;
    Ok(())
}

/// Serialize the inbound request back to its wire form. Captured bytes are
/// stored verbatim and only re-parsed at read time.
fn dump_request(parts: &request::Parts, body: &[u8]) -> Vec<u8> {
    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| "/".to_string(), ToString::to_string);

    let mut raw = format!("{} {} {:?}\r\n", parts.method, target, parts.version).into_bytes();
    for (name, value) in &parts.headers {
        raw.extend_from_slice(name.as_str().as_bytes());
        raw.extend_from_slice(b": ");
        raw.extend_from_slice(value.as_bytes());
        raw.extend_from_slice(b"\r\n");
    }
    raw.extend_from_slice(b"\r\n");
    raw.extend_from_slice(body);
    raw
}

/// The fixed acknowledgement sent (and recorded) for captured requests.
fn dump_ok_response() -> Vec<u8> {
    b"HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: 2\r\n\r\nOK"
        .to_vec()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("recovered from panic in request handler: {detail}");

    let body = Json(json!({
        "error": { "message": "internal server error, please try again" },
    }));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_ids_parse_and_ignore_other_params() {
        let id = Ulid::new();
        let params = vec![
            ("hostId".to_string(), id.to_string()),
            ("other".to_string(), "x".to_string()),
        ];
        assert_eq!(parse_host_ids(&params).unwrap(), vec![id]);
    }

    #[test]
    fn malformed_host_ids_are_rejected() {
        let params = vec![("hostId".to_string(), "not-a-ulid".to_string())];
        assert!(matches!(
            parse_host_ids(&params),
            Err(Error::InvalidHostId(_))
        ));
    }

    #[test]
    fn dumped_requests_reparse_cleanly() {
        let request = Request::builder()
            .method("POST")
            .uri("http://lure.oast.example.com/cb?a=b")
            .header("host", "lure.oast.example.com")
            .header("x-probe", "1")
            .body(())
            .unwrap();
        let (parts, ()) = request.into_parts();

        let raw = dump_request(&parts, b"payload");
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("POST /cb?a=b HTTP/1.1\r\n"));
        assert!(text.contains("host: lure.oast.example.com\r\n"));
        assert!(text.contains("x-probe: 1\r\n"));
        assert!(text.ends_with("\r\n\r\npayload"));
    }

    #[test]
    fn canned_response_is_valid_http() {
        let raw = dump_ok_response();
        let mut headers = [httparse::EMPTY_HEADER; 8];
        let mut response = httparse::Response::new(&mut headers);
        assert!(matches!(
            response.parse(&raw),
            Ok(httparse::Status::Complete(_))
        ));
        assert_eq!(response.code, Some(200));
    }
}
