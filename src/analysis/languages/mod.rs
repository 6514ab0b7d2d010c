//! Language-specific fact extractors.
//!
//! Each module exposes the same five free functions (`extract_functions`,
//! `extract_classes`, `extract_imports`, `extract_exports`, `extract_calls`),
//! wired into dispatch tables in `analysis::extractors`.

pub mod ecmascript;
pub mod go;
pub mod java;
pub mod python;
