pub mod archive;
pub mod confirmation;
pub mod decision;
pub mod engine;
pub mod history;
pub mod loop_control;
pub mod prompt;
pub mod session;
pub mod state;
