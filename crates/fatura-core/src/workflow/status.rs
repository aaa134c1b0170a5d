//! Invoice lifecycle states and the actions that move between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Awaiting compliance review.
    Pending,
    /// Reviewed and forwarded for payment authorization.
    ComplianceApproved,
    /// Payment recorded (simulated).
    Paid,
    RejectedAtCompliance,
    RejectedAtPayment,
}

/// Operator action on an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ApproveCompliance,
    RejectCompliance,
    Pay,
    RejectPayment,
}

impl InvoiceStatus {
    /// Target state for `action`, or `None` when the transition is not allowed.
    pub fn next(self, action: Action) -> Option<InvoiceStatus> {
        use Action::*;
        use InvoiceStatus::*;

        match (self, action) {
            (Pending, ApproveCompliance) => Some(ComplianceApproved),
            (Pending | ComplianceApproved, RejectCompliance) => Some(RejectedAtCompliance),
            (ComplianceApproved, Pay) => Some(Paid),
            (ComplianceApproved, RejectPayment) => Some(RejectedAtPayment),
            _ => None,
        }
    }

    /// No action is accepted from a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InvoiceStatus::Paid
                | InvoiceStatus::RejectedAtCompliance
                | InvoiceStatus::RejectedAtPayment
        )
    }

    /// Label shown to reviewers.
    pub fn label(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pendente",
            InvoiceStatus::ComplianceApproved => "conferida",
            InvoiceStatus::Paid => "paga",
            InvoiceStatus::RejectedAtCompliance => "rejeitada na conferência",
            InvoiceStatus::RejectedAtPayment => "rejeitada no pagamento",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::ComplianceApproved => "compliance-approved",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::RejectedAtCompliance => "rejected at compliance",
            InvoiceStatus::RejectedAtPayment => "rejected at payment",
        };
        f.write_str(name)
    }
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::ApproveCompliance,
        Action::RejectCompliance,
        Action::Pay,
        Action::RejectPayment,
    ];

    /// Precondition reported when the action is refused.
    pub fn requirement(self) -> &'static str {
        match self {
            Action::ApproveCompliance => "must be pending to approve compliance",
            Action::RejectCompliance => "must be pending or compliance-approved to reject",
            Action::Pay => "must be compliance-approved before payment",
            Action::RejectPayment => "must be compliance-approved before rejection at payment",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::ApproveCompliance => "approve compliance",
            Action::RejectCompliance => "reject at compliance",
            Action::Pay => "pay",
            Action::RejectPayment => "reject at payment",
        };
        f.write_str(name)
    }
}
