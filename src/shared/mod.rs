pub(crate) mod blocking;
pub mod error;
pub(crate) mod security;
pub(crate) mod time;
