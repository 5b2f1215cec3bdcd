pub mod payment;
pub mod pin;
pub mod ports;
pub mod transaction;
pub mod wallet;
