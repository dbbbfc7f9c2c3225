//! These models represent the objects passed around by the agent
//!
//! There are a few related formats we need to interact with:
//! - openai messages/tools, sent from the agent to the LLM
//! - tool provider requests and responses, sent from the agent to the tool server
//! - the conversation wire format, used by the HTTP API and session files
//!
//! We always immediately convert those formats into the internal structs using
//! to/from helpers, so the internal models are not an exact match for any of them.
pub mod message;
pub mod role;
pub mod tool;
