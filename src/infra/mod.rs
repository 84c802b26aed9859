pub mod helper_process;
pub mod token_store;
