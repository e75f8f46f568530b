//! Outgoing HTTP response core.
//!
//! Models the reply side of an HTTP exchange: an immutable-by-convention
//! [`Response`] whose body can be consumed as raw bytes, decoded text,
//! JSON, or form fields - exactly once no matter how many callers ask -
//! plus single-range byte serving (RFC 7233 subset) for file bodies.
//!
//! Routing, the listener/transport, TLS, and form decoding are external
//! collaborators; the transport consumes a response's status, headers, and
//! chunk stream, and a form decoder plugs in through
//! [`form::FormDataParser`].

pub mod body;
pub mod error;
pub mod form;
pub mod http;
pub mod response;

pub use body::{Body, ByteChunks};
pub use error::{BodyError, FormDataError, JsonError};
pub use form::{DeferredBody, FormDataParser, FormFields};
pub use response::Response;
