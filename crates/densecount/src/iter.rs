//! Iterator extension methods.

pub use densecount_kde::iter::zip_exact;
