//! Filesystem primitives shared across features.

pub mod atomic;
pub mod tree_hash;

pub use atomic::{
    Swap, copy_path, copy_tree, publish_new, remove_path, stage_dir, unique_temp_path,
    write_file_atomic,
};
pub use tree_hash::hash_tree;
