use crate::error::MarketError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Farmer,
    Admin,
}

impl FromStr for Role {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Role::Buyer),
            "farmer" => Ok(Role::Farmer),
            "admin" => Ok(Role::Admin),
            other => Err(MarketError::ValidationError(format!(
                "Unknown role '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Buyer => "buyer",
            Role::Farmer => "farmer",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// An authenticated caller. Authentication happens upstream; the core only
/// trusts the identity and role it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: u64, role: Role) -> Self {
        Self {
            id: ActorId(id),
            role,
        }
    }

    pub fn buyer(id: u64) -> Self {
        Self::new(id, Role::Buyer)
    }

    pub fn farmer(id: u64) -> Self {
        Self::new(id, Role::Farmer)
    }

    pub fn admin(id: u64) -> Self {
        Self::new(id, Role::Admin)
    }
}

/// A subscriber phone number accepted for mobile-money payments.
///
/// Accepts an optional `+`, an optional leading `1`, then 9 to 15 digits.
/// Stored in the provider's MSISDN form (`2547XXXXXXXX`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        // the optional `1` is consumed only when the rest still has 9+ digits
        let body = match digits.strip_prefix('1') {
            Some(rest) if rest.len() >= 9 => rest,
            _ => digits,
        };
        if !(9..=15).contains(&body.len()) || !body.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MarketError::ValidationError(format!(
                "Phone number must be entered in the format: '+999999999'. Up to 15 digits allowed, got '{}'",
                raw
            )));
        }

        let msisdn = if let Some(local) = digits.strip_prefix('0') {
            format!("254{}", local)
        } else if digits.len() == 9 && digits.starts_with('7') {
            format!("254{}", digits)
        } else {
            digits.to_string()
        };
        Ok(Self(msisdn))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
