//! NETCONF protocol: hello negotiation, messages, sessions.
//!
//! # Protocol Overview
//!
//! The push engine talks to one server over client-initiated sessions.
//! Every session starts with a hello exchange; the first client message
//! carries the out-of-band metadata header in front of the XML body.
//!
//! ## Message Flow
//!
//! ```text
//! Client                                  Server
//!    |                                       |
//!    |--- [header]<hello> (client caps) --->|  Opening message
//!    |<------- <hello> (caps, session-id) --|  Session established
//!    |                                       |
//!    |--- <rpc message-id=1> edit-config -->|
//!    |<-- <rpc-reply message-id=1> <ok/> ---|
//!    |--- <rpc message-id=2> commit ------->|
//!    |<-- <rpc-reply message-id=2> ---------|  <ok/> or <rpc-error>
//!    |                                       |
//!    |--- <rpc> close-session ------------->|  Terminate
//! ```
//!
//! Every message on the wire is followed by the `]]>]]>` end-of-message
//! marker (see [`crate::codec`]).
//!
//! ## Reply classification
//!
//! | reply payload                         | outcome                  |
//! |---------------------------------------|--------------------------|
//! | `<ok/>`                               | success                  |
//! | `<rpc-error>` marked optimistic-lock  | version conflict (retry) |
//! | any other `<rpc-error>`               | fatal RPC failure        |

mod capabilities;
mod message;
mod session;

pub use capabilities::{CapabilitySet, BASE_CAPABILITY};
pub use message::{
    NetconfMessage, ReplyError, ReplyStatus, NETCONF_NS, OPTIMISTIC_LOCK_APP_TAG,
};
pub use session::Session;
