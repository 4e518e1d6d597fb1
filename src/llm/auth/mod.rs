//! Credential handling for Google endpoints

pub mod adc;

pub use adc::AuthenticationManager;
