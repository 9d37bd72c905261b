//! # Content Model
//!
//! Plain DTOs shared by every pipeline stage and every store.
//!
//! Design rule: this module is pure data. No I/O, no state, no async.

pub mod node;
pub mod qname;
pub mod value;
pub mod property_map;

pub use node::{ContentObject, NodeRef, DEFAULT_STORE};
pub use qname::{QName, QNameError};
pub use value::Value;
pub use property_map::{properties, PropertyMap};
