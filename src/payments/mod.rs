pub mod error;
pub mod http;
pub mod mpesa;
pub mod types;
pub mod validate;

pub use error::{PaymentError, PaymentResult};
pub use mpesa::{MpesaClient, MpesaConfig, MpesaEnvironment};
