//! MCP (Model Context Protocol) Streamable HTTP support.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - Send a JSON-RPC message
//! - `GET /mcp` - Not supported (no server-initiated streams)
//! - `DELETE /mcp` - Terminate session
//!
//! ## Session Management
//!
//! Sessions are identified by the `Mcp-Session-Id` header, assigned when an
//! `initialize` request arrives without one and required for everything
//! that follows. All sessions share one [`CapabilityRegistry`].

pub mod capabilities;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod session;
pub mod transport;

pub use capabilities::build_registry;
pub use registry::CapabilityRegistry;
pub use router::{Routed, RoutingError, SessionRouter};
pub use session::{InMemorySessionStore, McpSession, SessionStore};
pub use transport::{SessionTransport, TransportState};

/// Header carrying the session ID.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
