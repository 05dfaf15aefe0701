pub mod breaker;
pub mod policy;

pub use breaker::FailureBreaker;
pub use policy::RetryPolicy;
