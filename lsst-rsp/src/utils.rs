pub mod env_var;
pub mod format_bytes;
pub mod host;
pub mod str_bool;

pub use format_bytes::format_bytes;
pub use host::{get_digest, get_hostname};
pub use str_bool::str_bool;
