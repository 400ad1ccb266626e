pub mod error;
pub mod polling;
pub mod provider;
pub mod providers;
pub mod signature;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use polling::PollPolicy;
pub use provider::PaymentProcessor;
pub use providers::wompi::WompiProcessor;
pub use types::*;
