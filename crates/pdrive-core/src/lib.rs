pub mod config;
pub mod error;
pub mod types;

pub use error::{DriveError, DriveResult};
pub use types::{Link, MovedLink, MovedLinkInfo, NodeIdentifier};
