pub mod callback_repo;
pub mod payment_repo;

pub use callback_repo::CallbackRepository;
pub use payment_repo::PaymentRepository;
