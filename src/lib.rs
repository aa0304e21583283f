//! Facial Match - simulated facial match flow with a mock PIX checkout
//!
//! The library holds the step controller that walks a user from criteria
//! selection through photo upload, simulated matching, payment and download,
//! together with the mocked matcher, registration oracle and payment session
//! builder it drives.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{mask_sensitive_data, FlowEvent, FlowSession, Matcher, RecordStore, SessionBuilder, Step};
pub use models::{MatchResult, PaymentSession, SelectionCriteria, UploadedImage};
pub use services::{FlowService, FlowServiceOptions};
