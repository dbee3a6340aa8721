pub mod daemon;
pub mod secret;
pub mod share;
pub mod version;

pub use daemon::Daemon;
pub use secret::Secret;
pub use share::Share;
pub use version::Version;
