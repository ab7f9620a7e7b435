//! File placement primitives for shared payloads.
//!
//! Names coming from remote peers are untrusted: [`clean_file_name`] reduces
//! them to a bare file name before they touch the file system. Downloads are
//! staged next to their destination ([`staging_path`]) and handed off with a
//! rename ([`move_file`]).

mod error;
mod name;
mod place;

pub use error::{Error, Result};
pub use name::{clean_file_name, split_name, staging_path, unique_path};
pub use place::{AtomicWriteOptions, atomic_write, move_file, persist_temp, set_modified};
