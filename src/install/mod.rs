//! Installer tasks that run alongside a server launch.

mod plugins;
mod progress;

pub use plugins::*;
pub use progress::*;
