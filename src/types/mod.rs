pub mod gmail;

pub use gmail::{ListMessagesResponse, MessageHeader, MessagePart, MessagePayload, MessageRef, PartBody, RawMessage};
