//! Order refund eligibility
//!
//! Orders live in the managed backend. This module holds the typed view of
//! the fields refund decisions depend on, and the pure rules that turn that
//! view into an eligibility verdict or an override plan.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Default window granted by `extend_window` when no hours are given
pub const DEFAULT_WINDOW_HOURS: f64 = 24.0;

/// Statuses that close an order to refunds for good
const TERMINAL_STATUSES: [&str; 2] = ["completed", "cancelled"];

/// Backend order document, reduced to the fields used here
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrderSnapshot {
    /// Backend document ID
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub chef_id: Option<String>,
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub is_refundable: Option<bool>,
    #[serde(default, deserialize_with = "millis")]
    pub delivered_at: Option<i64>,
    #[serde(default, deserialize_with = "millis")]
    pub completed_at: Option<i64>,
    #[serde(default, deserialize_with = "millis")]
    pub reviewed_at: Option<i64>,
    #[serde(default, deserialize_with = "millis")]
    pub refund_eligible_until: Option<i64>,
    #[serde(rename = "_creationTime", default, deserialize_with = "millis")]
    pub created_at: Option<i64>,
    #[serde(rename = "updatedAt", default, deserialize_with = "millis")]
    pub updated_at: Option<i64>,
}

/// Backend timestamps are JS numbers and may carry a fractional part
fn millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|v| v as i64))
}

impl OrderSnapshot {
    pub fn status(&self) -> &str {
        self.order_status.as_deref().unwrap_or("")
    }

    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATUSES.contains(&self.status())
    }

    /// Delivered, with a window that has not yet closed at `now`
    pub fn in_open_window(&self, now: i64) -> bool {
        match (self.delivered_at, self.refund_eligible_until) {
            (Some(_), Some(until)) => now <= until,
            _ => false,
        }
    }
}

/// Verdict for one order at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundEligibility {
    pub is_eligible: bool,
    pub reason: String,
    /// Milliseconds left in the window
    pub time_remaining: Option<i64>,
    /// Milliseconds since the window closed
    pub time_expired: Option<i64>,
    pub can_be_overridden: bool,
    pub override_reason: String,
}

impl RefundEligibility {
    fn verdict(is_eligible: bool, reason: impl Into<String>, override_reason: impl Into<String>) -> Self {
        Self {
            is_eligible,
            reason: reason.into(),
            time_remaining: None,
            time_expired: None,
            can_be_overridden: true,
            override_reason: override_reason.into(),
        }
    }
}

/// Evaluate refund eligibility at `now` (epoch ms). First matching rule wins.
pub fn evaluate_eligibility(order: &OrderSnapshot, now: i64) -> RefundEligibility {
    if order.is_terminal() {
        let status = order.status();
        return RefundEligibility {
            can_be_overridden: false,
            ..RefundEligibility::verdict(
                false,
                format!("Order status is {}", status),
                format!("Cannot override {} status", status),
            )
        };
    }

    // A missing flag counts as non-refundable
    if !order.is_refundable.unwrap_or(false) {
        return RefundEligibility::verdict(
            false,
            "Order marked as non-refundable",
            "Admin can restore refund eligibility",
        );
    }

    match (order.delivered_at, order.refund_eligible_until) {
        (Some(_), Some(until)) if now > until => RefundEligibility {
            time_expired: Some(now - until),
            ..RefundEligibility::verdict(
                false,
                "24-hour refund window has expired",
                "Admin can extend refund window",
            )
        },
        (Some(_), Some(until)) => RefundEligibility {
            time_remaining: Some(until - now),
            ..RefundEligibility::verdict(
                true,
                "Within 24-hour refund window",
                "Admin can revoke refund eligibility",
            )
        },
        (Some(_), None) => RefundEligibility::verdict(
            false,
            "No refund window set for delivered order",
            "Admin can set refund window",
        ),
        (None, _) => RefundEligibility::verdict(
            true,
            "Order not yet delivered",
            "Admin can revoke refund eligibility",
        ),
    }
}

/// Status filter accepted by the eligibility listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatusFilter {
    Refundable,
    NonRefundable,
    Expired,
}

impl RefundStatusFilter {
    /// Unknown values are ignored rather than rejected
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "refundable" => Some(Self::Refundable),
            "non-refundable" => Some(Self::NonRefundable),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refundable => "refundable",
            Self::NonRefundable => "non-refundable",
            Self::Expired => "expired",
        }
    }
}

/// Admin override applied to one order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundAction {
    MarkNonRefundable,
    MarkRefundable,
    ExtendWindow,
}

impl RefundAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mark_non_refundable" => Some(Self::MarkNonRefundable),
            "mark_refundable" => Some(Self::MarkRefundable),
            "extend_window" => Some(Self::ExtendWindow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkNonRefundable => "mark_non_refundable",
            Self::MarkRefundable => "mark_refundable",
            Self::ExtendWindow => "extend_window",
        }
    }
}

/// Backend write an accepted override turns into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverridePlan {
    /// `updateRefundEligibility`
    SetRefundable(bool),
    /// `updateRefundWindow` with the new closing time
    ExtendWindow { until: i64, hours: f64 },
}

/// Decide whether `action` may be applied to `order` at `now`.
///
/// The error string is the per-order failure reported back to the admin.
pub fn plan_override(
    order: &OrderSnapshot,
    action: RefundAction,
    new_window_hours: Option<f64>,
    effective_immediately: bool,
    now: i64,
) -> Result<OverridePlan, String> {
    if order.is_terminal() && action == RefundAction::MarkRefundable {
        return Err(format!(
            "Order cannot be made refundable due to status: {}",
            order.status()
        ));
    }

    match action {
        RefundAction::MarkNonRefundable => {
            if order.is_refundable == Some(false) {
                return Err("Order is already marked as non-refundable".to_string());
            }
            if !effective_immediately && order.in_open_window(now) {
                return Err(
                    "Order is still within the 24-hour refund window. Use effectiveImmediately=true to override."
                        .to_string(),
                );
            }
            Ok(OverridePlan::SetRefundable(false))
        }
        RefundAction::MarkRefundable => {
            if order.is_refundable == Some(true) {
                return Err("Order is already marked as refundable".to_string());
            }
            Ok(OverridePlan::SetRefundable(true))
        }
        RefundAction::ExtendWindow => {
            if order.delivered_at.is_none() {
                return Err("Cannot extend window for undelivered order".to_string());
            }
            let hours = new_window_hours.unwrap_or(DEFAULT_WINDOW_HOURS);
            let until = window_offset(hours)
                .and_then(|offset| now.checked_add(offset))
                .ok_or_else(|| "Invalid newWindowHours".to_string())?;
            Ok(OverridePlan::ExtendWindow { until, hours })
        }
    }
}

/// `hours` as whole milliseconds, `None` when it cannot be a timestamp offset
fn window_offset(hours: f64) -> Option<i64> {
    let millis = (hours * MILLIS_PER_HOUR).round();
    if millis.is_finite() && millis.abs() < i64::MAX as f64 {
        Some(millis as i64)
    } else {
        None
    }
}
