pub mod chunk;
pub mod classify;
pub mod config;
pub mod decompose;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod genpept;
pub mod output;
pub mod pipeline;
pub mod sanitize;
pub mod taxonomy;
