//! Boundary to the external filter-expression compiler: per-event-kind field
//! type declarations it compiles against, and the opaque compiled predicates
//! it hands back for the tracing engine to consume.

use std::collections::HashMap;

/// Value types a declared sample field can have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    SignedInt64,
    UnsignedInt16,
    UnsignedInt32,
    UnsignedInt64,
    String,
}

/// Mapping from a declared field name to its value type. Static and immutable,
/// one per event kind.
pub type FieldTypeMap = HashMap<&'static str, ValueType>;

/// A compiled filter predicate, produced by the external expression compiler
/// and consumed untouched by the tracing engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter(String);

impl Filter {
    pub fn new<S: Into<String>>(predicate: S) -> Filter {
        Filter(predicate.into())
    }

    pub fn predicate(&self) -> &str {
        &self.0
    }
}
