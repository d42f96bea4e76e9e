mod close_all;
mod gateway;
mod run;
mod status;

pub use close_all::{close_all, CloseAllArgs};
pub use run::{run, RunArgs};
pub use status::{status, StatusArgs};
