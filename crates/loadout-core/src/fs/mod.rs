//! Filesystem primitives shared across handlers.

pub mod atomic;
pub mod content_hash;
pub mod deliver;
pub mod install_mode;
pub mod paths;

pub use atomic::write_atomic;
pub use content_hash::{hash_bytes, hash_files};
pub use deliver::{place_file, path_occupied, remove_path};
pub use install_mode::InstallMode;
pub use paths::{contained_path, validate_resource_name};
