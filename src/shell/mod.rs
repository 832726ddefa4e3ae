pub mod alias;
pub mod command;
pub mod history;
pub mod repl;

pub use repl::Shell;
