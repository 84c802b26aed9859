pub mod driver;
pub mod helper_protocol;
pub mod presets;
pub mod token_exchange;
