use crate::models::{
    Category, Gender, MatchResult, PartialSelection, PaymentSession, Platform, SelectionCriteria,
    UploadedImage,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Step of the purchase flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Selection,
    Upload,
    Processing,
    Results,
    Payment,
    Download,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Selection => "selection",
            Step::Upload => "upload",
            Step::Processing => "processing",
            Step::Results => "results",
            Step::Payment => "payment",
            Step::Download => "download",
        };
        f.write_str(name)
    }
}

/// Errors raised when an event is not allowed in the current state
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("Event '{event}' is not allowed in step '{step}'")]
    InvalidTransition { step: Step, event: &'static str },

    #[error("Platform, category and gender must all be chosen")]
    IncompleteSelection,

    #[error("File '{0}' is not an image")]
    NotAnImage(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("No file attached")]
    NoFileAttached,

    #[error("A match run is in progress")]
    Busy,

    #[error("Match '{0}' is not part of the current results")]
    UnknownMatch(String),

    #[error("Match '{0}' is already registered on the platform")]
    MatchAlreadyRegistered(String),

    #[error("No payment has been issued")]
    PaymentNotIssued,

    #[error("Payment session {0} has expired")]
    PaymentExpired(String),

    #[error("Results are not empty; pick a match instead")]
    ResultsNotEmpty,
}

/// Input to the state machine
#[derive(Debug, Clone)]
pub enum FlowEvent {
    SetPlatform(Platform),
    SetCategory(Category),
    SetGender(Gender),
    Advance,
    AttachFile(UploadedImage),
    Submit,
    MatchesResolved { run_id: u64, matches: Vec<MatchResult> },
    MatchRunFailed { run_id: u64, reason: String },
    Cancel,
    PickMatch { match_id: String },
    PaymentIssued(PaymentSession),
    PaymentConfirmed { at: DateTime<Utc> },
    Retry,
    Reset,
}

impl FlowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FlowEvent::SetPlatform(_) => "set_platform",
            FlowEvent::SetCategory(_) => "set_category",
            FlowEvent::SetGender(_) => "set_gender",
            FlowEvent::Advance => "advance",
            FlowEvent::AttachFile(_) => "attach_file",
            FlowEvent::Submit => "submit",
            FlowEvent::MatchesResolved { .. } => "matches_resolved",
            FlowEvent::MatchRunFailed { .. } => "match_run_failed",
            FlowEvent::Cancel => "cancel",
            FlowEvent::PickMatch { .. } => "pick_match",
            FlowEvent::PaymentIssued(_) => "payment_issued",
            FlowEvent::PaymentConfirmed { .. } => "payment_confirmed",
            FlowEvent::Retry => "retry",
            FlowEvent::Reset => "reset",
        }
    }
}

/// Work the caller must perform after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartMatchRun {
        run_id: u64,
        criteria: SelectionCriteria,
        image: UploadedImage,
    },
    CancelMatchRun { run_id: u64 },
    IssuePayment { selected: MatchResult },
}

/// Whole state of one user's flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSession {
    pub step: Step,
    pub selection: PartialSelection,
    pub upload: Option<UploadedImage>,
    /// Criteria frozen for the latest match run
    pub submitted: Option<SelectionCriteria>,
    pub matches: Vec<MatchResult>,
    pub selected: Option<MatchResult>,
    pub payment: Option<PaymentSession>,
    /// Id of the latest match run; completions for older runs are dropped
    pub run_id: u64,
    pub last_error: Option<String>,
}

pub type Transition = (FlowSession, Vec<Effect>);

impl FlowSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event, returning the next state and the effects to run.
    ///
    /// `self` is never modified; a rejected event leaves the caller's state
    /// untouched.
    pub fn apply(&self, event: FlowEvent) -> Result<Transition, FlowError> {
        let event_name = event.name();
        let invalid = || FlowError::InvalidTransition {
            step: self.step,
            event: event_name,
        };

        let mut next = self.clone();
        let mut effects = Vec::new();

        match (self.step, event) {
            (Step::Processing, FlowEvent::SetPlatform(_))
            | (Step::Processing, FlowEvent::SetCategory(_))
            | (Step::Processing, FlowEvent::SetGender(_))
            | (Step::Processing, FlowEvent::AttachFile(_))
            | (Step::Processing, FlowEvent::Submit) => return Err(FlowError::Busy),

            (Step::Selection, FlowEvent::SetPlatform(platform)) => {
                next.selection.platform = Some(platform);
            }
            (Step::Selection, FlowEvent::SetCategory(category)) => {
                next.selection.category = Some(category);
            }
            (Step::Selection, FlowEvent::SetGender(gender)) => {
                next.selection.gender = Some(gender);
            }
            (Step::Selection, FlowEvent::Advance) => {
                if self.selection.complete().is_none() {
                    return Err(FlowError::IncompleteSelection);
                }
                next.step = Step::Upload;
            }

            (Step::Upload, FlowEvent::AttachFile(image)) => {
                if !image.is_image() {
                    return Err(FlowError::NotAnImage(image.file_name));
                }
                if image.size == 0 {
                    return Err(FlowError::EmptyUpload);
                }
                next.upload = Some(image);
                next.last_error = None;
            }
            (Step::Upload, FlowEvent::Submit) => {
                let image = self.upload.clone().ok_or(FlowError::NoFileAttached)?;
                let criteria = self
                    .selection
                    .complete()
                    .ok_or(FlowError::IncompleteSelection)?;

                next.run_id = self.run_id + 1;
                next.step = Step::Processing;
                next.submitted = Some(criteria);
                next.matches.clear();
                next.last_error = None;
                effects.push(Effect::StartMatchRun {
                    run_id: next.run_id,
                    criteria,
                    image,
                });
            }

            (Step::Processing, FlowEvent::MatchesResolved { run_id, matches }) => {
                if run_id != self.run_id {
                    return Ok((next, effects));
                }
                next.matches = matches;
                next.step = Step::Results;
            }
            (Step::Processing, FlowEvent::MatchRunFailed { run_id, reason }) => {
                if run_id != self.run_id {
                    return Ok((next, effects));
                }
                next.step = Step::Upload;
                next.last_error = Some(reason);
            }
            // Completions arriving after a cancel or reset are stale
            (_, FlowEvent::MatchesResolved { .. }) | (_, FlowEvent::MatchRunFailed { .. }) => {
                return Ok((next, effects));
            }
            (Step::Processing, FlowEvent::Cancel) => {
                next.step = Step::Upload;
                effects.push(Effect::CancelMatchRun {
                    run_id: self.run_id,
                });
            }

            (Step::Results, FlowEvent::PickMatch { match_id })
            | (Step::Payment, FlowEvent::PickMatch { match_id }) => {
                let chosen = self
                    .matches
                    .iter()
                    .find(|m| m.id() == match_id)
                    .ok_or_else(|| FlowError::UnknownMatch(match_id.clone()))?;
                if !chosen.is_selectable() {
                    return Err(FlowError::MatchAlreadyRegistered(match_id));
                }
                next.selected = Some(chosen.clone());
                next.payment = None;
                next.step = Step::Payment;
                effects.push(Effect::IssuePayment {
                    selected: chosen.clone(),
                });
            }
            (Step::Results, FlowEvent::Retry) => {
                if !self.matches.is_empty() {
                    return Err(FlowError::ResultsNotEmpty);
                }
                next.step = Step::Selection;
                next.upload = None;
                next.submitted = None;
                next.last_error = None;
            }

            (Step::Payment, FlowEvent::PaymentIssued(session)) => {
                let expected = self.selected.as_ref().map(|m| m.id());
                if expected != Some(session.match_id.as_str()) {
                    // Issued for a match the user has since replaced
                    return Ok((next, effects));
                }
                next.payment = Some(session);
            }
            (Step::Payment, FlowEvent::PaymentConfirmed { at }) => {
                let payment = self.payment.as_ref().ok_or(FlowError::PaymentNotIssued)?;
                if payment.is_expired_at(at) {
                    return Err(FlowError::PaymentExpired(payment.order_id.clone()));
                }
                next.step = Step::Download;
            }

            (Step::Download, FlowEvent::Reset) => {
                next = FlowSession {
                    run_id: self.run_id,
                    ..FlowSession::default()
                };
            }

            _ => return Err(invalid()),
        }

        Ok((next, effects))
    }

    /// Criteria chosen so far, complete or not
    pub fn selection(&self) -> &PartialSelection {
        &self.selection
    }

    pub fn is_processing(&self) -> bool {
        self.step == Step::Processing
    }
}
