pub mod audit;
pub mod error;
pub mod logging;
mod recipient;
mod request;
mod result;
mod token;

pub use error::ErrorKind;
pub use recipient::{Recipient, RecipientId};
pub use request::{AlertRequest, CallerIdentity};
pub use result::{DispatchFailure, DispatchResult};
pub use token::DeliveryToken;
pub use tracing;

#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
