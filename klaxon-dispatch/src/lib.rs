//! Alarm dispatch core
//!
//! This crate provides functionality to:
//! - Validate alarm requests against the authentication policy
//! - Resolve recipients to delivery tokens through a bounded TTL cache
//! - Build high-priority alarm payloads from a template
//! - Deliver payloads through a push channel with bounded retries

pub mod channel;
mod dispatcher;
mod error;
mod message;
pub mod policy;
mod resolver;
mod service;
pub mod store;
mod validator;

// Re-export channel types
pub use channel::{ChannelConfig, DeliveryChannel, DryRunChannel, FcmChannel, FcmConfig};
// Re-export common types
pub use klaxon_common::{DispatchResult, ErrorKind};
// Re-export core types
pub use dispatcher::{DispatchState, Dispatcher};
// Re-export error types
pub use error::{AlertError, ChannelError, StoreError};
pub use message::{AlertData, AlertParams, AlertPayload, AlertTemplate, MessageBuilder};
pub use policy::RetryPolicy;
pub use resolver::{ResolverConfig, TokenResolver};
pub use service::{AlarmReceipt, AlertService, DispatchConfig};
pub use store::{MemoryRecipientStore, RecipientStore};
pub use validator::RequestValidator;
