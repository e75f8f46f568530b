//! The outgoing HTTP response entity.
//!
//! A `Response` is a value: status, headers, body source. Headers are only
//! readable once constructed; derivation goes through [`Response::copy_with`],
//! which yields a new instance and leaves the receiver untouched. The one
//! internal mutation is the lazily-installed body cache, a dedicated
//! single-assignment cell shared by every text/JSON accessor.

use std::path::Path;
use std::sync::Arc;

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use hyper::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::body::{Body, ByteChunks};
use crate::error::{BodyError, FormDataError, JsonError};
use crate::form::{DeferredBody, FormDataParser, FormFields};
use crate::http::range::{content_range_value, resolve_range, RangeOutcome};

/// An outgoing HTTP response.
///
/// Cheap to share across concurrent readers (`&Response` is all a reader
/// needs); the body stream underneath is drained at most once no matter how
/// many callers ask for it.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    /// Memoized outcome of the first drain-and-decode. Absent until the
    /// first `body()` call, then resolved exactly once.
    text: Arc<OnceCell<Result<String, BodyError>>>,
}

impl Response {
    fn assemble(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
            text: Arc::new(OnceCell::new()),
        }
    }

    /// Response with no body and no headers.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self::assemble(status, HeaderMap::new(), Body::empty())
    }

    /// Response with a UTF-8 text body.
    pub fn text(status: StatusCode, body: impl Into<String>, headers: HeaderMap) -> Self {
        Self::assemble(status, headers, Body::from(body.into()))
    }

    /// Response with a raw byte body.
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>, headers: HeaderMap) -> Self {
        Self::assemble(status, headers, Body::full(body))
    }

    /// JSON response. Serializes `payload` when present; a `None` payload
    /// produces an empty body without attempting serialization, but still
    /// carries the JSON content type.
    ///
    /// `Content-Type: application/json` is applied after the caller's
    /// headers, so it always wins over a caller-supplied content type.
    ///
    /// # Errors
    /// Returns the serializer error when `payload` cannot be encoded; no
    /// response is produced in that case.
    pub fn json<T: Serialize + ?Sized>(
        status: StatusCode,
        payload: Option<&T>,
        mut headers: HeaderMap,
    ) -> Result<Self, serde_json::Error> {
        let body = match payload {
            Some(value) => Body::from(serde_json::to_vec(value)?),
            None => Body::empty(),
        };
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(Self::assemble(status, headers, body))
    }

    /// File byte-range response (RFC 7233 single-range subset).
    ///
    /// The status, headers, and body are exactly the range resolver's
    /// output for every method, including HEAD:
    ///
    /// - missing header, missing file, or malformed range: 400, base
    ///   headers only;
    /// - `start` at or past the end of the file: 416, base headers only;
    /// - otherwise: 206 with `Content-Length` and `Content-Range` added to
    ///   the base headers and a lazy stream over `[start, end]` - omitted
    ///   entirely for HEAD.
    ///
    /// Never fails; protocol-level range problems are encoded in the
    /// status code.
    pub async fn file_range(
        path: impl AsRef<Path>,
        headers: HeaderMap,
        method: &Method,
        range_header: Option<&str>,
    ) -> Self {
        let path = path.as_ref();
        let length = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => None,
        };

        match resolve_range(range_header, length) {
            RangeOutcome::BadRequest => {
                Self::assemble(StatusCode::BAD_REQUEST, headers, Body::empty())
            }
            RangeOutcome::NotSatisfiable => {
                Self::assemble(StatusCode::RANGE_NOT_SATISFIABLE, headers, Body::empty())
            }
            RangeOutcome::Partial { start, end, length } => {
                let mut headers = headers;
                headers.insert(CONTENT_LENGTH, HeaderValue::from(end - start + 1));
                headers.insert(
                    CONTENT_RANGE,
                    HeaderValue::from_str(&content_range_value(start, end, length))
                        .expect("Content-Range value is a valid header value"),
                );
                let body = if *method == Method::HEAD {
                    Body::empty()
                } else {
                    Body::file_range(path.to_path_buf(), start, end)
                };
                Self::assemble(StatusCode::PARTIAL_CONTENT, headers, body)
            }
        }
    }

    /// Derive a new response, the only sanctioned way to "modify" one.
    ///
    /// Supplied headers are merged over the receiver's (override by name);
    /// a supplied body replaces it and gets a fresh body cache. Anything
    /// not supplied is retained - including, for the body, the shared
    /// stream slot and cache, so one drain serves both instances.
    #[must_use]
    pub fn copy_with(&self, headers: Option<HeaderMap>, body: Option<Body>) -> Self {
        let merged = match headers {
            Some(patch) => {
                let mut merged = self.headers.clone();
                for (name, value) in &patch {
                    merged.insert(name.clone(), value.clone());
                }
                merged
            }
            None => self.headers.clone(),
        };

        match body {
            Some(body) => Self::assemble(self.status, merged, body),
            None => Self {
                status: self.status,
                headers: merged,
                body: self.body.clone(),
                text: Arc::clone(&self.text),
            },
        }
    }

    /// Status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Read-only view of the headers (lookups are case-insensitive).
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Begin consuming the body as a finite, non-restartable chunk
    /// sequence. This is the one allowed drain of the underlying stream,
    /// shared with [`Response::body`]; taking it twice yields a sequence
    /// that reports [`BodyError::AlreadyConsumed`].
    #[must_use]
    pub fn bytes(&self) -> ByteChunks {
        self.body.chunks()
    }

    /// The body as UTF-8 text.
    ///
    /// The first call drains and decodes the stream; the outcome - success
    /// or failure - is memoized, and every later call, sequential or
    /// concurrent, observes the identical outcome without a second drain.
    /// Racing callers suspend on the cell until the winner resolves it.
    pub async fn body(&self) -> Result<String, BodyError> {
        self.text
            .get_or_init(|| async move {
                let bytes = self.bytes().collect().await?;
                String::from_utf8(bytes.into())
                    .map_err(|e| BodyError::Decode(e.to_string()))
            })
            .await
            .clone()
    }

    /// Parse the body text as JSON.
    ///
    /// # Errors
    /// Fails with [`JsonError::Body`] when the body cannot be drained or
    /// decoded, and [`JsonError::Parse`] when the text is not valid JSON.
    pub async fn decode_json<T: DeserializeOwned>(&self) -> Result<T, JsonError> {
        let text = self.body().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Decode the body as form fields via an external parser.
    ///
    /// Forwards the headers and a deferred body accessor; whether and when
    /// the body text is pulled is the parser's decision.
    pub async fn form_data<P: FormDataParser>(
        &self,
        parser: &P,
    ) -> Result<FormFields, FormDataError> {
        parser.parse(&self.headers, DeferredBody::new(self)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    /// 100 bytes: "0123456789" repeated.
    fn digits_fixture() -> tempfile::NamedTempFile {
        fixture("0123456789".repeat(10).as_bytes())
    }

    #[tokio::test]
    async fn text_body_reads_back() {
        let resp = Response::text(StatusCode::OK, "hello", HeaderMap::new());
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body().await.unwrap(), "hello");
        assert_eq!(resp.body().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn empty_body_decodes_to_empty_text() {
        let resp = Response::empty(StatusCode::NO_CONTENT);
        assert_eq!(resp.body().await.unwrap(), "");
    }

    #[tokio::test]
    async fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-Id", HeaderValue::from_static("42"));
        let resp = Response::text(StatusCode::OK, "", headers);
        assert_eq!(resp.headers().get("x-request-id").unwrap(), "42");
        assert_eq!(resp.headers().get("X-REQUEST-ID").unwrap(), "42");
    }

    #[tokio::test]
    async fn json_content_type_wins_over_caller() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let resp = Response::json(StatusCode::OK, Some(&serde_json::json!({"ok": true})), headers)
            .unwrap();
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "application/json");

        let value: serde_json::Value = resp.decode_json().await.unwrap();
        assert_eq!(value["ok"], serde_json::Value::Bool(true));
    }

    #[tokio::test]
    async fn json_without_payload_keeps_content_type_and_empty_body() {
        let resp =
            Response::json::<serde_json::Value>(StatusCode::OK, None, HeaderMap::new()).unwrap();
        assert_eq!(resp.headers().get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(resp.body().await.unwrap(), "");
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refuses to serialize"))
        }
    }

    #[test]
    fn json_serialization_failure_produces_no_response() {
        let result = Response::json(StatusCode::OK, Some(&Unserializable), HeaderMap::new());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn decode_json_rejects_non_json_text() {
        let resp = Response::text(StatusCode::OK, "not json at all", HeaderMap::new());
        match resp.decode_json::<serde_json::Value>().await {
            Err(JsonError::Parse(_)) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn copy_with_overrides_one_header_and_keeps_the_rest() {
        let mut headers = HeaderMap::new();
        headers.insert("X", HeaderValue::from_static("0"));
        headers.insert("Y", HeaderValue::from_static("kept"));
        let original = Response::text(StatusCode::OK, "payload", headers);

        let mut patch = HeaderMap::new();
        patch.insert("X", HeaderValue::from_static("1"));
        let derived = original.copy_with(Some(patch), None);

        assert_eq!(derived.headers().get("X").unwrap(), "1");
        assert_eq!(derived.headers().get("Y").unwrap(), "kept");
        assert_eq!(derived.body().await.unwrap(), "payload");

        // The receiver is unaffected.
        assert_eq!(original.headers().get("X").unwrap(), "0");
        assert_eq!(original.body().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn copy_with_replaces_body_with_fresh_cache() {
        let original = Response::text(StatusCode::OK, "old", HeaderMap::new());
        assert_eq!(original.body().await.unwrap(), "old");

        let derived = original.copy_with(None, Some(Body::from("new")));
        assert_eq!(derived.body().await.unwrap(), "new");
        assert_eq!(original.body().await.unwrap(), "old");
    }

    #[tokio::test]
    async fn from_bytes_streams_back() {
        let resp = Response::from_bytes(StatusCode::OK, vec![1u8, 2, 3], HeaderMap::new());
        let collected = resp.bytes().collect().await.unwrap();
        assert_eq!(collected.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn file_range_bounded() {
        let file = digits_fixture();
        let resp = Response::file_range(
            file.path(),
            HeaderMap::new(),
            &Method::GET,
            Some("bytes=0-9"),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers().get(CONTENT_LENGTH).unwrap(), "10");
        assert_eq!(resp.headers().get(CONTENT_RANGE).unwrap(), "bytes 0-9/100");
        assert_eq!(resp.body().await.unwrap(), "0123456789");
    }

    #[tokio::test]
    async fn file_range_suffix() {
        let file = digits_fixture();
        let resp =
            Response::file_range(file.path(), HeaderMap::new(), &Method::GET, Some("bytes=-4"))
                .await;

        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers().get(CONTENT_RANGE).unwrap(), "bytes 96-99/100");
        assert_eq!(resp.body().await.unwrap(), "6789");
    }

    #[tokio::test]
    async fn file_range_overshoot_clamps() {
        let file = digits_fixture();
        let resp = Response::file_range(
            file.path(),
            HeaderMap::new(),
            &Method::GET,
            Some("bytes=0-999999"),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers().get(CONTENT_LENGTH).unwrap(), "100");
        assert_eq!(resp.headers().get(CONTENT_RANGE).unwrap(), "bytes 0-99/100");
    }

    #[tokio::test]
    async fn file_range_head_omits_body() {
        let file = digits_fixture();
        let resp = Response::file_range(
            file.path(),
            HeaderMap::new(),
            &Method::HEAD,
            Some("bytes=20-29"),
        )
        .await;

        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers().get(CONTENT_LENGTH).unwrap(), "10");
        assert_eq!(resp.headers().get(CONTENT_RANGE).unwrap(), "bytes 20-29/100");
        let mut chunks = resp.bytes();
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn file_range_missing_header_is_bad_request() {
        let file = digits_fixture();
        let mut base = HeaderMap::new();
        base.insert("X-Base", HeaderValue::from_static("kept"));
        let resp = Response::file_range(file.path(), base, &Method::GET, None).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers().get("X-Base").unwrap(), "kept");
        assert!(resp.headers().get(CONTENT_RANGE).is_none());
        assert_eq!(resp.body().await.unwrap(), "");
    }

    #[tokio::test]
    async fn file_range_missing_file_is_bad_request() {
        let resp = Response::file_range(
            "/nonexistent/respond-test",
            HeaderMap::new(),
            &Method::GET,
            Some("bytes=0-9"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn file_range_unsatisfiable() {
        let file = digits_fixture();
        let mut base = HeaderMap::new();
        base.insert("X-Base", HeaderValue::from_static("kept"));
        let resp =
            Response::file_range(file.path(), base, &Method::GET, Some("bytes=200-")).await;

        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(resp.headers().get("X-Base").unwrap(), "kept");
        assert!(resp.headers().get(CONTENT_RANGE).is_none());
        let mut chunks = resp.bytes();
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn body_drains_the_stream_only_once() {
        let file = digits_fixture();
        let resp = Response::file_range(
            file.path(),
            HeaderMap::new(),
            &Method::GET,
            Some("bytes=0-99"),
        )
        .await;

        // A second physical drain would observe AlreadyConsumed; both calls
        // succeeding proves the stream was read exactly once.
        let first = resp.body().await.unwrap();
        let second = resp.body().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 100);
    }

    #[tokio::test]
    async fn concurrent_body_calls_observe_one_outcome() {
        let file = digits_fixture();
        let resp = Response::file_range(
            file.path(),
            HeaderMap::new(),
            &Method::GET,
            Some("bytes=0-99"),
        )
        .await;

        let (a, b, c) = tokio::join!(resp.body(), resp.body(), resp.body());
        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
    }

    #[tokio::test]
    async fn body_after_bytes_is_sticky_consumed_error() {
        let file = digits_fixture();
        let resp = Response::file_range(
            file.path(),
            HeaderMap::new(),
            &Method::GET,
            Some("bytes=0-9"),
        )
        .await;

        resp.bytes().collect().await.unwrap();

        let first = resp.body().await.unwrap_err();
        let second = resp.body().await.unwrap_err();
        assert_eq!(first, BodyError::AlreadyConsumed);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalid_utf8_body_fails_identically_every_time() {
        let file = fixture(&[0xff, 0xfe, 0xfd]);
        let resp = Response::file_range(
            file.path(),
            HeaderMap::new(),
            &Method::GET,
            Some("bytes=0-2"),
        )
        .await;

        let first = resp.body().await.unwrap_err();
        let second = resp.body().await.unwrap_err();
        assert!(matches!(first, BodyError::Decode(_)));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn copy_with_shares_the_drain_with_the_original() {
        let file = digits_fixture();
        let original = Response::file_range(
            file.path(),
            HeaderMap::new(),
            &Method::GET,
            Some("bytes=0-9"),
        )
        .await;
        let derived = original.copy_with(None, None);

        // One drain, observed by both instances.
        assert_eq!(original.body().await.unwrap(), "0123456789");
        assert_eq!(derived.body().await.unwrap(), "0123456789");
    }
}
