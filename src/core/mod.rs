// Core flow exports
pub mod controller;
pub mod masking;
pub mod matcher;
pub mod payment;
pub mod records;
pub mod registration;

pub use controller::{Effect, FlowError, FlowEvent, FlowSession, Step};
pub use masking::{mask_name, mask_national_id, mask_sensitive_data};
pub use matcher::{draw_similarity, Matcher, DEFAULT_SIMILARITY_THRESHOLD, MAX_SIMILARITY};
pub use payment::{SessionBuilder, PAYMENT_WINDOW_MINUTES};
pub use records::{RecordStore, RecordStoreError};
pub use registration::RegistrationOracle;
