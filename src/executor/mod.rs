pub mod coordinator;
pub mod dispatcher;
pub mod input;
pub mod input_mode;
pub mod safety;
