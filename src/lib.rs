//! `varflow` orchestrates single-host, multi-caller variant calling
//! pipelines. This package is composed of both a library crate, as well as a
//! binary crate.
//!
//! The library is organized around three pieces: an explicit directed acyclic
//! graph of subprocess-invoking jobs plus the scheduler that executes it
//! ([`dag`]), an in-process ensemble merge engine that consolidates the
//! outputs of several variant callers into one coordinate-sorted call set
//! ([`merge`]), and a coverage aggregator that folds per-sample region
//! coverage into cross-sample summaries ([`coverage`]). Everything else —
//! aligners, callers, annotators — is an external tool reached through the
//! narrow [`invoke`] boundary.
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]

pub mod config;
pub mod coverage;
pub mod dag;
pub mod errors;
pub mod invoke;
pub mod merge;
pub mod pipeline;
