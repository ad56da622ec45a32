pub mod payment_processor;
pub mod vnpay;

pub use payment_processor::{
    CallbackOutcome, CreatePaymentRequest, PaymentCreationResult, PaymentProcessor,
    ReconcileResult,
};
pub use vnpay::VnpayService;
