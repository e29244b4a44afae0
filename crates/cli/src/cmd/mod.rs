mod build;
mod info;
mod locate;

pub use build::{BuildOptions, cmd_build};
pub use info::cmd_info;
pub use locate::cmd_locate;
