//! Core contracts for AFC Assist: the secret bundle, the decrypted knowledge
//! document, and the agent interface used by the answering pipeline.
//! No IO lives here.

pub mod agent;
pub mod knowledge;
pub mod secrets;
