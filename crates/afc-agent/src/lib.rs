//! Answering pipeline: prompt construction, the hosted-model agent, and the
//! timeout/error boundary that always yields a displayable answer.

pub mod openai;
pub mod pipeline;
pub mod prompt;
