use crate::error::Error;
use crate::hosts::{CaptureEntry, MAX_HOSTS_PER_BATCH};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use ulid::Ulid;

/// Upper bound on headers when re-parsing captured messages.
const MAX_CAPTURE_HEADERS: usize = 64;

/// Success envelope: `{"data": ...}`.
#[derive(Serialize, Debug)]
pub(super) struct ApiData<T> {
    pub data: T,
}

#[derive(Deserialize, Debug, Clone, Default, Ord, PartialOrd, Eq, PartialEq)]
pub(super) struct CreateHostsRequest {
    pub amount: i64,
}

impl CreateHostsRequest {
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=MAX_HOSTS_PER_BATCH).contains(&self.amount) {
            return Err(Error::InvalidHostAmount(self.amount));
        }
        Ok(())
    }
}

/// A capture-log entry with its stored wire bytes re-parsed for display.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct CaptureEntryView {
    pub id: Ulid,
    pub host_id: Ulid,
    pub request: RequestView,
    pub response: ResponseView,
    pub created_at: String,
}

#[serde_as]
#[derive(Serialize, Debug)]
pub(super) struct RequestView {
    pub host: String,
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde_as(as = "Base64")]
    pub body: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub raw: Vec<u8>,
}

#[serde_as]
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct ResponseView {
    pub status_code: u16,
    pub status: String,
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde_as(as = "Base64")]
    pub body: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub raw: Vec<u8>,
}

/// Re-parse a stored entry's wire bytes. Decode failures are permanent; they
/// indicate the capture itself was malformed.
pub(super) fn decode_capture_entry(entry: &CaptureEntry) -> Result<CaptureEntryView, Error> {
    let mut header_buf = [httparse::EMPTY_HEADER; MAX_CAPTURE_HEADERS];
    let mut request = httparse::Request::new(&mut header_buf);
    let body_offset = match request.parse(&entry.raw_request)? {
        httparse::Status::Complete(offset) => offset,
        httparse::Status::Partial => return Err(Error::MalformedCapture),
    };

    let request_view = RequestView {
        host: header_value(request.headers, "host").unwrap_or_default(),
        url: request.path.unwrap_or("/").to_string(),
        method: request.method.unwrap_or_default().to_string(),
        headers: headers_map(request.headers),
        body: entry.raw_request[body_offset..].to_vec(),
        raw: entry.raw_request.clone(),
    };

    let mut header_buf = [httparse::EMPTY_HEADER; MAX_CAPTURE_HEADERS];
    let mut response = httparse::Response::new(&mut header_buf);
    let body_offset = match response.parse(&entry.raw_response)? {
        httparse::Status::Complete(offset) => offset,
        httparse::Status::Partial => return Err(Error::MalformedCapture),
    };

    let status_code = response.code.unwrap_or_default();
    let response_view = ResponseView {
        status_code,
        status: format!("{status_code} {}", response.reason.unwrap_or_default()),
        headers: headers_map(response.headers),
        body: entry.raw_response[body_offset..].to_vec(),
        raw: entry.raw_response.clone(),
    };

    Ok(CaptureEntryView {
        id: entry.id,
        host_id: entry.host_id,
        request: request_view,
        response: response_view,
        created_at: created_at(entry.id)?,
    })
}

/// The creation time implied by a time-sortable entry ID, as RFC 3339.
fn created_at(id: Ulid) -> Result<String, Error> {
    let timestamp =
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(id.timestamp_ms()) * 1_000_000)?;
    Ok(timestamp.format(&Rfc3339)?)
}

fn header_value(headers: &[httparse::Header<'_>], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| String::from_utf8_lossy(h.value).into_owned())
}

fn headers_map(headers: &[httparse::Header<'_>]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for header in headers {
        map.entry(header.name.to_ascii_lowercase())
            .or_default()
            .push(String::from_utf8_lossy(header.value).into_owned());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_bounds_are_enforced() {
        assert!(CreateHostsRequest { amount: 1 }.validate().is_ok());
        assert!(CreateHostsRequest { amount: 50 }.validate().is_ok());
        assert!(matches!(
            CreateHostsRequest { amount: 0 }.validate(),
            Err(Error::InvalidHostAmount(0))
        ));
        assert!(matches!(
            CreateHostsRequest { amount: 51 }.validate(),
            Err(Error::InvalidHostAmount(51))
        ));
        assert!(matches!(
            CreateHostsRequest { amount: -3 }.validate(),
            Err(Error::InvalidHostAmount(-3))
        ));
    }

    #[test]
    fn decoding_reproduces_the_original_message() {
        let raw_request = b"POST /callback?x=1 HTTP/1.1\r\n\
            host: lure.oast.example.com\r\n\
            content-type: text/plain\r\n\
            content-length: 4\r\n\
            \r\n\
            ping"
            .to_vec();
        let raw_response = b"HTTP/1.1 200 OK\r\n\
            content-type: text/plain; charset=utf-8\r\n\
            \r\n\
            OK"
        .to_vec();

        let entry = CaptureEntry {
            id: Ulid::new(),
            host_id: Ulid::new(),
            raw_request: raw_request.clone(),
            raw_response: raw_response.clone(),
        };
        let view = decode_capture_entry(&entry).unwrap();

        assert_eq!(view.request.method, "POST");
        assert_eq!(view.request.url, "/callback?x=1");
        assert_eq!(view.request.host, "lure.oast.example.com");
        assert_eq!(
            view.request.headers.get("content-type"),
            Some(&vec!["text/plain".to_string()])
        );
        assert_eq!(view.request.body, b"ping");
        assert_eq!(view.request.raw, raw_request);

        assert_eq!(view.response.status_code, 200);
        assert_eq!(view.response.status, "200 OK");
        assert_eq!(view.response.body, b"OK");
        assert_eq!(view.response.raw, raw_response);
    }

    #[test]
    fn truncated_captures_are_rejected() {
        let entry = CaptureEntry {
            id: Ulid::new(),
            host_id: Ulid::new(),
            raw_request: b"GET / HTTP/1.1\r\nhost: trunc".to_vec(),
            raw_response: Vec::new(),
        };
        assert!(matches!(
            decode_capture_entry(&entry),
            Err(Error::MalformedCapture)
        ));
    }

    #[test]
    fn created_at_comes_from_the_entry_id() {
        let id = Ulid::from_parts(1_700_000_000_000, 0);
        assert_eq!(created_at(id).unwrap(), "2023-11-14T22:13:20Z");
    }
}
