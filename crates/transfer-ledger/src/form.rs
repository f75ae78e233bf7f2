//! pending transfer form
//!
//! edited field by field as the user types. it is never cleared after a
//! submit; a fresh form comes from re-initialization.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    AddressTo,
    Amount,
    Keyword,
    Message,
}

impl FromStr for FormField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "addressTo" => Ok(FormField::AddressTo),
            "amount" => Ok(FormField::Amount),
            "keyword" => Ok(FormField::Keyword),
            "message" => Ok(FormField::Message),
            other => Err(format!("unknown form field: {}", other)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransferForm {
    pub address_to: String,
    /// decimal ether amount as typed
    pub amount: String,
    pub keyword: String,
    pub message: String,
}

impl PendingTransferForm {
    pub fn new(address_to: &str, amount: &str, keyword: &str, message: &str) -> Self {
        Self {
            address_to: address_to.to_string(),
            amount: amount.to_string(),
            keyword: keyword.to_string(),
            message: message.to_string(),
        }
    }

    /// update one field, leaving the others untouched
    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::AddressTo => self.address_to = value,
            FormField::Amount => self.amount = value,
            FormField::Keyword => self.keyword = value,
            FormField::Message => self.message = value,
        }
    }

    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::AddressTo => &self.address_to,
            FormField::Amount => &self.amount,
            FormField::Keyword => &self.keyword,
            FormField::Message => &self.message,
        }
    }

    /// every field filled in
    pub fn is_complete(&self) -> bool {
        [&self.address_to, &self.amount, &self.keyword, &self.message]
            .iter()
            .all(|f| !f.trim().is_empty())
    }
}
