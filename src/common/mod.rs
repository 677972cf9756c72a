mod cache;
mod queue;
mod shutdown;
mod vars;

pub use cache::MemCache;
pub use queue::{EventQueue, JobQueue};
pub use shutdown::Shutdown;
pub use vars::Vars;
