//! API Tests

mod health_tests;
mod pipeline_tests;
mod realtime_tests;
mod signup_tests;
