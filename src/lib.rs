//! Purpose: Library crate for the `colfile` columnar file format and its CLI.
//! Exports: `api` (stable surface), `core` (format, codec, writer, reader, validation, errors).
//! Role: Encode/decode engine; CSV, inspection, and benchmarking live in the binary.
//! Invariants: Callers outside this crate should go through `api`.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
