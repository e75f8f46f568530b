//! Narrow contract for the external form decoder.
//!
//! The decoding algorithm (urlencoded vs multipart) lives outside this
//! crate. A parser implementation receives the response headers plus a
//! deferred body accessor and returns a field-name to value mapping; it
//! alone decides whether and when to pull the body text.

use std::collections::HashMap;
use std::future::Future;

use hyper::header::HeaderMap;

use crate::error::{BodyError, FormDataError};
use crate::response::Response;

/// Decoded form fields, field name to value.
pub type FormFields = HashMap<String, String>;

/// Deferred accessor for the response body text.
///
/// `text()` is exactly [`Response::body`]: the first pull drains the
/// stream, and the outcome is memoized for everyone.
#[derive(Debug)]
pub struct DeferredBody<'a> {
    response: &'a Response,
}

impl<'a> DeferredBody<'a> {
    pub(crate) fn new(response: &'a Response) -> Self {
        Self { response }
    }

    /// Pull the whole body as UTF-8 text.
    pub async fn text(&self) -> Result<String, BodyError> {
        self.response.body().await
    }
}

/// External form decoder, consumed by [`Response::form_data`].
pub trait FormDataParser {
    /// Decode the body into form fields.
    fn parse(
        &self,
        headers: &HeaderMap,
        body: DeferredBody<'_>,
    ) -> impl Future<Output = Result<FormFields, FormDataError>>;
}
