// Network side: the controller connection and the text command protocol
// multiplexed over it.

pub mod protocol;
pub mod router;
pub mod session;

pub use protocol::{CommandKind, ProtocolCommand, ProtocolError};
pub use router::CommandRouter;
pub use session::{ConnectionState, Session, SessionConfig};
