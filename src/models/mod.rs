//! Column values and the slots they are scanned into.

pub mod value;

pub use value::{FromValue, ScanTarget, Value};
