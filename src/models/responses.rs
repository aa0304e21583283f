use crate::core::controller::{FlowSession, Step};
use crate::core::masking::mask_sensitive_data;
use crate::models::domain::{
    format_cents, Category, Gender, MatchResult, PartialSelection, PaymentSession, Platform,
    Pricing, UploadedImage,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-facing snapshot of a flow. Identity data is always masked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowView {
    #[serde(rename = "flowId")]
    pub flow_id: Uuid,
    pub step: Step,
    pub selection: PartialSelection,
    pub upload: Option<UploadedImage>,
    pub matches: Vec<MatchView>,
    #[serde(rename = "selectedMatchId")]
    pub selected_match_id: Option<String>,
    pub payment: Option<PaymentView>,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
}

impl FlowView {
    pub fn from_session(flow_id: Uuid, session: &FlowSession) -> Self {
        Self {
            flow_id,
            step: session.step,
            selection: session.selection,
            upload: session.upload.clone(),
            matches: session.matches.iter().map(MatchView::from).collect(),
            selected_match_id: session.selected.as_ref().map(|m| m.id().to_string()),
            payment: session.payment.as_ref().map(PaymentView::from),
            last_error: session.last_error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchView {
    pub id: String,
    #[serde(rename = "maskedName")]
    pub masked_name: String,
    #[serde(rename = "maskedNationalId")]
    pub masked_national_id: String,
    #[serde(rename = "photoRef")]
    pub photo_ref: String,
    pub platform: Platform,
    pub category: Category,
    pub gender: Gender,
    pub similarity: f64,
    #[serde(rename = "hasRegistration")]
    pub has_registration: bool,
    /// False for registered matches; the purchase action must be disabled
    pub selectable: bool,
}

impl From<&MatchResult> for MatchView {
    fn from(result: &MatchResult) -> Self {
        let record = &result.record;
        let masked = mask_sensitive_data(&record.display_name, &record.national_id);
        Self {
            id: record.id.clone(),
            masked_name: masked.name,
            masked_national_id: masked.national_id,
            photo_ref: record.photo_ref.clone(),
            platform: record.platform,
            category: record.category,
            gender: record.gender,
            similarity: result.similarity,
            has_registration: result.has_registration,
            selectable: result.is_selectable(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentView {
    #[serde(rename = "pixCode")]
    pub pix_code: String,
    pub amount: String,
    #[serde(rename = "amountCents")]
    pub amount_cents: u64,
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<&PaymentSession> for PaymentView {
    fn from(session: &PaymentSession) -> Self {
        Self {
            pix_code: session.code.clone(),
            amount: format_cents(session.amount_cents),
            amount_cents: session.amount_cents,
            order_id: session.order_id.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

/// Options the client can choose from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub platforms: Vec<Platform>,
    pub categories: Vec<Category>,
    pub genders: Vec<Gender>,
    pub pricing: PricingView,
    #[serde(rename = "similarityThreshold")]
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingView {
    #[serde(rename = "photoFile")]
    pub photo_file: String,
    #[serde(rename = "textFile")]
    pub text_file: String,
    pub total: String,
}

impl From<Pricing> for PricingView {
    fn from(pricing: Pricing) -> Self {
        Self {
            photo_file: format_cents(pricing.photo_file_cents),
            text_file: format_cents(pricing.text_file_cents),
            total: format_cents(pricing.total_cents()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(rename = "activeFlows")]
    pub active_flows: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::records::RecordStore;

    #[test]
    fn test_match_view_masks_identity() {
        let result = MatchResult {
            record: RecordStore::builtin().get("3").unwrap().clone(),
            similarity: 91.2,
            has_registration: true,
        };

        let view = MatchView::from(&result);
        assert_eq!(view.masked_name, "Carlos E****** L***");
        assert_eq!(view.masked_national_id, "456.***.***-45");
        assert!(!view.selectable);

        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("Eduardo"));
    }

    #[test]
    fn test_pricing_view() {
        let view = PricingView::from(Pricing::default());
        assert_eq!(view.photo_file, "25.00");
        assert_eq!(view.text_file, "15.00");
        assert_eq!(view.total, "40.00");
    }
}
