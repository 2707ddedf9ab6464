pub mod backoff;
pub mod json;
pub mod observability;
pub mod signal;
pub mod time;

#[cfg(test)]
mod backoff_test;
#[cfg(test)]
mod json_test;
