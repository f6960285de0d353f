//! Enumerated column values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use cobham_common::Error;

/// Subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Monthly,
    Yearly,
    Student,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Monthly => "monthly",
            Plan::Yearly => "yearly",
            Plan::Student => "student",
        }
    }

    /// Price in cents (USD)
    pub fn price_cents(&self) -> i64 {
        match self {
            Plan::Free => 0,
            Plan::Monthly => 999,
            Plan::Yearly => 8999,
            Plan::Student => 499,
        }
    }

    /// Length of one paid period
    pub fn months(&self) -> u32 {
        match self {
            Plan::Yearly => 12,
            _ => 1,
        }
    }

    /// Plan a payment buys; free or unknown names fall back to monthly
    pub fn purchasable(name: Option<&str>) -> Plan {
        match name.and_then(|n| n.parse().ok()) {
            Some(Plan::Yearly) => Plan::Yearly,
            Some(Plan::Student) => Plan::Student,
            _ => Plan::Monthly,
        }
    }
}

impl FromStr for Plan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "monthly" => Ok(Plan::Monthly),
            "yearly" => Ok(Plan::Yearly),
            "student" => Ok(Plan::Student),
            other => Err(Error::InvalidInput(format!("Unknown plan: {}", other))),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(Error::Internal(format!("Unknown subscription status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PaymentStatus::Created),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(Error::Internal(format!("Unknown payment status: {}", other))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render integer cents as a decimal string ("9.99")
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_prices_and_lengths() {
        assert_eq!(format_cents(Plan::Monthly.price_cents()), "9.99");
        assert_eq!(format_cents(Plan::Yearly.price_cents()), "89.99");
        assert_eq!(format_cents(Plan::Student.price_cents()), "4.99");
        assert_eq!(Plan::Yearly.months(), 12);
        assert_eq!(Plan::Student.months(), 1);
    }

    #[test]
    fn test_purchasable_falls_back_to_monthly() {
        assert_eq!(Plan::purchasable(Some("YEARLY")), Plan::Yearly);
        assert_eq!(Plan::purchasable(Some("free")), Plan::Monthly);
        assert_eq!(Plan::purchasable(Some("lifetime")), Plan::Monthly);
        assert_eq!(Plan::purchasable(None), Plan::Monthly);
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(1000), "10.00");
        assert_eq!(format_cents(-250), "-2.50");
    }
}
