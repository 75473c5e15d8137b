pub mod pipeline;
pub mod session;

pub use pipeline::{pipeline_middleware, ClientSource};
pub use session::{session_middleware, Authenticated, SessionContext};
