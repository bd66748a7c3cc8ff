//! Foundation types for Shoal.
//!
//! Every object that crosses a process boundary is named by an [`ObjectId`]:
//! a canonical UUID v1 string generated locally without coordination.
//! Entities obtain their identifier lazily through [`LazyId`]; nothing is
//! generated until something asks.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- network-wide identifier, with [`ROOT_ID`] reserved for the
//!   store's root object
//! - [`LazyId`] -- single-assignment identifier slot
//! - [`Identifiable`] -- anything that can report its identifier

pub mod error;
pub mod identity;
pub mod lazy;

pub use error::TypeError;
pub use identity::{ObjectId, ROOT_ID};
pub use lazy::{Identifiable, LazyId};
