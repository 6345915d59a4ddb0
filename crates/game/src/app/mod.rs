pub(crate) mod bootstrap;
pub(crate) mod console;
pub(crate) mod demo_world;
pub(crate) mod input;
pub(crate) mod loop_runner;
pub(crate) mod menu;
pub(crate) mod session;
