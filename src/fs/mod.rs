pub mod atomic;
pub mod edit;
pub mod meta;

pub use atomic::{atomic_write, open_dir_nofollow, remove_file_durable, Fault, WriteOptions};
pub use meta::{meta_of, set_permissions, sha256_hex_of, FileMeta};
