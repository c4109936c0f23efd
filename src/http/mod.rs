//! HTTP/1.1 message handling.
//!
//! # Data Flow
//! ```text
//! byte stream (client or origin)
//!     → codec.rs (read header block, parse with httparse)
//!     → request.rs / response.rs (header models, raw bytes retained)
//!     → [relay inspects, maybe injects Authorization]
//!     → codec.rs (write verbatim or re-serialized)
//! ```

pub mod codec;
pub mod headers;
pub mod request;
pub mod response;

pub use codec::{BodyFraming, CodecError};
pub use headers::HeaderList;
pub use request::{origin_form, RequestHeader};
pub use response::ResponseHeader;
