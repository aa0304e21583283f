// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    format_cents, CandidateRecord, Category, Gender, MaskedIdentity, MatchResult, PartialSelection,
    PaymentSession, Platform, Pricing, ScoredCandidate, SelectionCriteria, UploadedImage,
};
pub use requests::{SelectionRequest, UploadQuery};
pub use responses::{
    CatalogResponse, ErrorResponse, FlowView, HealthResponse, MatchView, PaymentView, PricingView,
};
