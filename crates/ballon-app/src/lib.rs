// Library root: run-level concerns shared by the binary and its tests.

pub mod forecast;
pub mod output;
pub mod sources;
