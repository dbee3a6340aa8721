mod not_found;
mod relay;

pub use not_found::not_found_handler;
pub use relay::relay_handler;
