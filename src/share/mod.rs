//! Configured network shares and the registry that owns them.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{ShareError, ShareResult};
pub use registry::ShareRegistry;
pub use types::{
    format_connected_for, format_time_ago, system_mount_path, Share, ShareId, DEFAULT_MOUNT_ROOT,
};
