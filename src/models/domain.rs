use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Ride platform a candidate drives for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "99 Pop", alias = "99pop")]
    NinetyNinePop,
    #[serde(rename = "Uber", alias = "uber")]
    Uber,
    #[serde(rename = "Abas", alias = "abas")]
    Abas,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::NinetyNinePop, Platform::Uber, Platform::Abas];

    pub fn label(&self) -> &'static str {
        match self {
            Platform::NinetyNinePop => "99 Pop",
            Platform::Uber => "Uber",
            Platform::Abas => "Abas",
        }
    }
}

/// Vehicle category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Carro", alias = "carro")]
    Carro,
    #[serde(rename = "Moto", alias = "moto")]
    Moto,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Carro, Category::Moto];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Carro => "Carro",
            Category::Moto => "Moto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "Masculino", alias = "masculino")]
    Masculino,
    #[serde(rename = "Feminino", alias = "feminino")]
    Feminino,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Masculino, Gender::Feminino];

    pub fn label(&self) -> &'static str {
        match self {
            Gender::Masculino => "Masculino",
            Gender::Feminino => "Feminino",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Complete set of criteria submitted for a match run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub platform: Platform,
    pub category: Category,
    pub gender: Gender,
}

/// Criteria as the user is still choosing them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSelection {
    pub platform: Option<Platform>,
    pub category: Option<Category>,
    pub gender: Option<Gender>,
}

impl PartialSelection {
    /// Returns the full criteria once all three fields are chosen
    pub fn complete(&self) -> Option<SelectionCriteria> {
        Some(SelectionCriteria {
            platform: self.platform?,
            category: self.category?,
            gender: self.gender?,
        })
    }
}

/// Identity record held by the record store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    #[serde(rename = "displayName", alias = "name")]
    pub display_name: String,
    #[serde(rename = "nationalId", alias = "cpf")]
    pub national_id: String,
    #[serde(rename = "photoRef", alias = "photo")]
    pub photo_ref: String,
    pub platform: Platform,
    pub category: Category,
    pub gender: Gender,
    #[serde(rename = "hasRegistration", default)]
    pub has_registration: bool,
}

impl CandidateRecord {
    pub fn matches_criteria(&self, criteria: &SelectionCriteria) -> bool {
        self.platform == criteria.platform
            && self.category == criteria.category
            && self.gender == criteria.gender
    }
}

/// Photo supplied by the user. The bytes are never inspected.
///
/// Serialized forms carry the metadata only. `size` keeps the byte count of the
/// original upload, so after a round trip `data` is empty while `size` is not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub size: usize,
    /// Held in memory only, never serialized
    #[serde(skip)]
    pub data: Arc<Vec<u8>>,
}

impl UploadedImage {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: data.len(),
            data: Arc::new(data),
        }
    }

    /// MIME check on the declared content type
    pub fn is_image(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Candidate that survived filtering, with its simulated similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub record: CandidateRecord,
    pub similarity: f64,
}

/// Scored candidate annotated with its registration status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub record: CandidateRecord,
    pub similarity: f64,
    #[serde(rename = "hasRegistration")]
    pub has_registration: bool,
}

impl MatchResult {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Only unregistered matches may be purchased
    pub fn is_selectable(&self) -> bool {
        !self.has_registration
    }
}

/// Item prices in centavos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(rename = "photoFileCents")]
    pub photo_file_cents: u64,
    #[serde(rename = "textFileCents")]
    pub text_file_cents: u64,
}

impl Pricing {
    pub fn total_cents(&self) -> u64 {
        self.photo_file_cents + self.text_file_cents
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            photo_file_cents: 2500,
            text_file_cents: 1500,
        }
    }
}

/// Mock PIX checkout issued for a selected match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    #[serde(rename = "pixCode")]
    pub code: String,
    #[serde(rename = "amountCents")]
    pub amount_cents: u64,
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "matchId")]
    pub match_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl PaymentSession {
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Redacted identity shown to the buyer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedIdentity {
    pub name: String,
    #[serde(rename = "nationalId")]
    pub national_id: String,
}

/// Formats centavos as a decimal amount, e.g. 4000 -> "40.00"
pub fn format_cents(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
