//! A deliberately small stand-in for OPC UA's `Variant` tagged union (Part 6,
//! 5.1.2), which in the full type system spans ~25 scalar/array kinds plus
//! structure and extension-object encodings. Monitored-item value evaluation
//! is out of scope (spec §1); the engine only ever moves a `Variant` around,
//! it never inspects one, so a handful of common cases is enough to exercise
//! harvesting and serialization end to end.

use serde_derive::{Deserialize, Serialize};

use crate::date_time::DateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    Boolean(bool),
    Int32(i32),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub value: Variant,
    pub source_timestamp: DateTime,
}
