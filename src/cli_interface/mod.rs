mod cli_struct;
mod command_runner;
pub use cli_struct::*;
pub use command_runner::*;
