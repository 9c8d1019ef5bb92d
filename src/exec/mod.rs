mod runner;

pub use runner::{CommandExecutor, TIMEOUT_EXIT_CODE};
