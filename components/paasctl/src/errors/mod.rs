pub mod action_error;
pub mod command_error;
