pub mod interceptor;

pub use interceptor::{LoggingInterceptor, NoopInterceptor, RequestInterceptor};
