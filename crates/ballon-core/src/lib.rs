// Library root: award-ranking to ratings record linkage.
//
// Data flows leaf-first: ranking rows -> name patterns -> candidate index ->
// linker -> points merger, orchestrated per year by the pipeline.

pub mod columns;
pub mod config;
pub mod index;
pub mod link;
pub mod merge;
pub mod pattern;
pub mod pipeline;
pub mod positions;
pub mod predict;
pub mod ranking;
pub mod ratings;
