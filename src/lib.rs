#[macro_use]
mod macros;
pub(crate) mod common;
pub(crate) mod cutils;
pub(crate) mod log;
pub(crate) mod system;

mod shell;

pub use shell::main as shell_main;
