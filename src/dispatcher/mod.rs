#[allow(clippy::module_inception)]
mod dispatcher;

pub use dispatcher::{Dispatcher, Wake};
