//! # Item Model
//!
//! Identifiers, names, paths, values, and the descriptors a repository
//! service hands back. These types cross every boundary:
//! service ↔ factory ↔ state ↔ caller.
//!
//! Design rule: this module is pure data and never performs I/O.

pub mod name;
pub mod path;
pub mod id;
pub mod value;
pub mod descriptor;

pub use name::Name;
pub use path::{Path, PathElement, ParsePathError, DEFAULT_INDEX};
pub use id::{NodeId, PropertyId, ItemId};
pub use value::{Value, PropertyType};
pub use descriptor::{NodeDescriptor, PropertyDescriptor, ChildDescriptor, Descriptor};
