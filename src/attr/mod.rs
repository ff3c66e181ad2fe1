//! Attribute model and algebra

pub mod algebra;
pub mod path;
pub mod pattern;
pub mod value;

pub use algebra::{
    generalize, match_pattern, project, subsumes, unify, union, Bindings, UnificationResult,
};
pub use path::AttrPath;
pub use pattern::{AttrPattern, AttrQuery};
pub use value::{Atom, Attribute, AttributeValue};
