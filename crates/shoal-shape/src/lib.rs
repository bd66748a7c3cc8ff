//! Structural type interning for Shoal.
//!
//! Every distinct object shape seen by a process gets one shared
//! [`TypeDescriptor`], keyed by a deterministic [`ShapeSignature`]
//! (`o#name#child#` for an object with properties `name` then `child`,
//! `a#0#1#` for a two-element array). Replicated payloads reference the
//! descriptor once and then carry raw positional values, instead of repeating
//! property names in every message.
//!
//! Property order is part of a shape. Two objects with the same property set
//! inserted in a different order intern as distinct descriptors.

pub mod descriptor;
pub mod error;
pub mod signature;
pub mod store;

pub use descriptor::TypeDescriptor;
pub use error::{ShapeError, ShapeResult};
pub use signature::{ShapeKind, ShapeSignature, Shaped};
pub use store::TypeStore;
