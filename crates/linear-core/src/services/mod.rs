pub mod issues;
pub mod sync;

#[cfg(test)]
pub(crate) mod fake;
