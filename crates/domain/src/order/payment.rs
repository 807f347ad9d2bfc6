//! Payment instrument attached to an order.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Card details submitted with an order.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    card_number: String,
    expiry_month: u32,
    expiry_year: i32,
    cardholder: String,
}

impl PaymentDetails {
    /// Creates payment details, rejecting an out-of-range expiry month.
    pub fn new(
        card_number: impl Into<String>,
        expiry_month: u32,
        expiry_year: i32,
        cardholder: impl Into<String>,
    ) -> Result<Self, OrderError> {
        if !(1..=12).contains(&expiry_month) {
            return Err(OrderError::InvalidExpiry {
                month: expiry_month,
                year: expiry_year,
            });
        }

        Ok(Self {
            card_number: card_number.into(),
            expiry_month,
            expiry_year,
            cardholder: cardholder.into(),
        })
    }

    /// Returns the full card number.
    pub fn card_number(&self) -> &str {
        &self.card_number
    }

    /// Returns the card number with all but the last four digits hidden.
    pub fn masked_number(&self) -> String {
        let digits: Vec<char> = self.card_number.chars().collect();
        let visible: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        format!("**** {visible}")
    }

    /// Returns the expiry month (1-12).
    pub fn expiry_month(&self) -> u32 {
        self.expiry_month
    }

    /// Returns the expiry year.
    pub fn expiry_year(&self) -> i32 {
        self.expiry_year
    }

    /// Returns the cardholder name.
    pub fn cardholder(&self) -> &str {
        &self.cardholder
    }

    /// Returns true if the card is no longer valid at `now`.
    ///
    /// Cards expire at the end of their expiry month, so the boundary is
    /// midnight UTC on the first day of the following month.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let (year, month) = if self.expiry_month == 12 {
            (self.expiry_year + 1, 1)
        } else {
            (self.expiry_year, self.expiry_month + 1)
        };

        match NaiveDate::from_ymd_opt(year, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0)) {
            Some(boundary) => now >= Utc.from_utc_datetime(&boundary),
            None => true,
        }
    }

    /// Returns true if the card is no longer valid now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns a card that stays valid for the next few years.
    pub fn test_card() -> Self {
        Self {
            card_number: "4242424242424242".to_string(),
            expiry_month: 12,
            expiry_year: Utc::now().year() + 3,
            cardholder: "Test Customer".to_string(),
        }
    }
}

impl std::fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("card_number", &self.masked_number())
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cardholder", &self.cardholder)
            .finish()
    }
}
