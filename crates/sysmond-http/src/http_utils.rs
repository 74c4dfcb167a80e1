// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use http_body_util::Full;
use hyper::{
    body::Bytes,
    header,
    http,
    Response, StatusCode,
};
use serde_json::json;
use sysmond_collector::Snapshot;
use tracing::{debug, error};

pub type HttpResponse = Response<Full<Bytes>>;

/// Header carrying the collection time of the returned snapshot.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
const APPLICATION_JSON: &str = "application/json";

/// Does two things:
/// 1. Logs the given message. A success status code (within 200-299) will cause a debug log to be
///    written, otherwise error will be written.
/// 2. Returns the given message in the body of JSON response with the given status code.
///
/// Response body format:
/// {
///     "message": message
/// }
pub fn log_and_create_http_response(
    message: &str,
    status: StatusCode,
) -> http::Result<HttpResponse> {
    if status.is_success() {
        debug!("{message}");
    } else {
        error!("{message}");
    }
    let body = json!({ "message": message }).to_string();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, APPLICATION_JSON)
        .body(Full::new(Bytes::from(body)))
}

/// Builds the response for one published snapshot.
///
/// The body is the flat JSON encoding of `snapshot`. If encoding fails the
/// status is 500 and the body is `{"error": message}`. Both carry the
/// collection time in the `X-Timestamp` header.
pub fn create_metrics_response(
    timestamp: SystemTime,
    snapshot: &Snapshot,
) -> http::Result<HttpResponse> {
    let timestamp = format_timestamp(timestamp);
    let (status, body) = match snapshot.serialize() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }).to_string().into_bytes(),
            )
        }
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, APPLICATION_JSON)
        .header(TIMESTAMP_HEADER, timestamp)
        .body(Full::new(Bytes::from(body)))
}

/// Formats `timestamp` as RFC 3339 in UTC, with as many fractional digits as
/// needed.
pub fn format_timestamp(timestamp: SystemTime) -> String {
    DateTime::<Utc>::from(timestamp).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::collections::HashMap;
    use std::time::{Duration, UNIX_EPOCH};

    async fn body_string(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(UNIX_EPOCH), "1970-01-01T00:00:00Z");
        assert_eq!(
            format_timestamp(UNIX_EPOCH + Duration::from_millis(1_700_000_000_250)),
            "2023-11-14T22:13:20.250Z"
        );
    }

    #[tokio::test]
    async fn test_metrics_response() {
        let snapshot = Snapshot::from(HashMap::from([
            ("sys.mem.total".to_string(), "1024".to_string()),
            ("version.sysmond".to_string(), "0.1.0".to_string()),
        ]));

        let response =
            create_metrics_response(UNIX_EPOCH + Duration::from_secs(60), &snapshot).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(response.headers()[TIMESTAMP_HEADER], "1970-01-01T00:01:00Z");
        assert_eq!(
            body_string(response).await,
            r#"{"sys.mem.total":"1024","version.sysmond":"0.1.0"}"#
        );
    }

    #[tokio::test]
    async fn test_log_and_create_http_response() {
        let response =
            log_and_create_http_response("Not found: /nope", StatusCode::NOT_FOUND).unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_string(response).await,
            r#"{"message":"Not found: /nope"}"#
        );
    }
}
