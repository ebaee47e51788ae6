use serde::Serialize;
use serde_json::Value;

/// Outcome of a checkout or reconciliation attempt.
///
/// Evidence is the provider data the decision was based on and is kept for
/// manual reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentResult {
    #[serde(rename = "succeeded")]
    Success { evidence: Value },
    #[serde(rename = "failed")]
    Failure { reason: String, evidence: Value },
    Pending,
    Redirect { url: String },
}

impl PaymentResult {
    pub fn success(evidence: Value) -> Self {
        PaymentResult::Success { evidence }
    }

    pub fn fail(reason: impl Into<String>, evidence: Value) -> Self {
        PaymentResult::Failure {
            reason: reason.into(),
            evidence,
        }
    }

    pub fn pending() -> Self {
        PaymentResult::Pending
    }

    pub fn redirect(url: impl Into<String>) -> Self {
        PaymentResult::Redirect { url: url.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PaymentResult::Failure { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            PaymentResult::Failure { reason, .. } => Some(reason),
            _ => None,
        }
    }
}
