pub mod health;
pub mod payments;
pub mod vnpay;

pub use health::*;
pub use payments::*;
pub use vnpay::*;
