pub(crate) mod bootstrap;
pub(crate) mod hooks;
pub(crate) mod loop_runner;
