//! traceviz-interchange: shared JSON types.
//!
//! Provides the compact wire form for values (`[ValueType, payload]`
//! pairs whose strings may be indices into a shared string table) and the
//! script format consumed by `traceviz simulate`. The evaluator converts
//! between these and its own live `Value`s.

pub mod script;
pub mod wire;

pub use script::{Script, ScriptStep};
pub use wire::{StringTableBuilder, ValueType, WireError, WireValue};
