use serde::{Deserialize, Serialize};

use crate::services::ConsolidatedContact;

/// Body of `POST /identify`. Both fields are optional at the wire level;
/// the resolver rejects a request that carries neither.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<PhoneNumber>,
}

/// Clients send phone numbers both quoted and bare.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PhoneNumber {
    Text(String),
    Number(serde_json::Number),
}

impl PhoneNumber {
    pub fn into_string(self) -> String {
        match self {
            PhoneNumber::Text(s) => s,
            PhoneNumber::Number(n) => n.to_string(),
        }
    }
}

impl IdentifyRequest {
    pub fn into_parts(self) -> (Option<String>, Option<String>) {
        (self.email, self.phone_number.map(PhoneNumber::into_string))
    }
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub contact: ConsolidatedContact,
}
