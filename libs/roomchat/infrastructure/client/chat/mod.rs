//! Chat wire protocol on top of roomsocket envelopes

pub mod protocol;

pub use protocol::{classify, Inbound, RoomContext};
