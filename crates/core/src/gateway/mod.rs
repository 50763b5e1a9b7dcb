//! Push-channel session: connect, identify, heartbeat, dispatch fan-out.

mod session;
mod state;

pub use session::{DispatchStream, Session, SessionEvent};
pub use state::SessionState;
