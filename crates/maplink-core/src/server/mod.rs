//! MAS session serving: request handling and the OBEX packet loop.

mod handler;
mod operation;
mod session;

pub use handler::RequestHandler;
pub use operation::{BufferedOperation, Operation};
pub use session::serve_session;
