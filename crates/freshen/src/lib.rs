//! freshen - keeps a device connected to its dashboard.
//!
//! The [`Agent`] owns an [`RpcContext`](freshen_rpc::RpcContext), the OTA
//! state and a [`Session`](session::Session). Each poll moves the session
//! one step: connect, upgrade to WebSocket, then dispatch every inbound
//! frame to the registry and send the replies back as masked Text frames.
//! After the first exchange on a connection the agent commits a freshly
//! installed image, cancelling its rollback.
//!
//! [`host`] provides file system, key-value and OTA capabilities for a
//! POSIX host; [`transport`] provides TCP and TLS connections.

pub mod agent;
pub mod config;
pub mod host;
pub mod session;
pub mod transport;
pub mod ws;

pub use agent::Agent;
pub use config::{AgentConfig, Cli, ConfigError};
pub use session::{PollOutcome, Session, SessionConfig, SessionEvent};
pub use transport::{Connection, Connector, Endpoint, TcpConnector, TransportError};
