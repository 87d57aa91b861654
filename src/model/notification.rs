//! Structured payment notification, as read off a proof-of-payment document.
//!
//! Values are parsed, not validated: nothing here checks that the amount or
//! account match what the business expects.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NotificationHeader {
    pub title: String,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Payer {
    pub name: String,
    /// Payer category, verbatim (e.g. `"individual"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Visible digits of the paying account.
    pub account: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    pub header: NotificationHeader,
    pub payer: Payer,
    pub trace_id: String,
    pub payment: String,
    /// Currency-prefixed amount, left as text.
    pub amount: String,
    pub bank: String,
    pub branch: u64,
    pub reference: String,
    /// Date and time actioned. The document carries no zone.
    pub date: NaiveDateTime,
    pub footer: String,
}
