//! Request extractors.

pub mod principal;
