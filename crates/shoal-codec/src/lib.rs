//! Reference-aware value codec for Shoal.
//!
//! Field values cross process boundaries as short text tokens. Links to
//! other objects are encoded as `<id>` references rather than inlined
//! copies, which keeps cyclic structures finite and avoids transmitting the
//! same object twice.
//!
//! - [`decode`] / [`encode`] -- single-token grammar (see [`token`])
//! - [`encode_fields`] / [`decode_fields`] -- whole objects as positional
//!   tokens against a shared [`TypeDescriptor`](shoal_shape::TypeDescriptor)
//! - [`UnknownReference`] -- placeholder for a reference whose target has not
//!   arrived yet

pub mod error;
pub mod fields;
pub mod token;
pub mod value;

pub use error::{CodecError, CodecResult};
pub use fields::{decode_fields, encode_fields};
pub use token::{decode, encode};
pub use value::{Reference, UnknownReference, Value};
