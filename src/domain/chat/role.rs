//! Who is on the other end of a connection, and who authored a frame.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Role of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    /// Browser chat widget bound to one conversation.
    Customer,
    /// Agent console; receives agent-wide notifications.
    Agent,
}

impl ClientRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientRole::Customer => "customer",
            ClientRole::Agent => "agent",
        }
    }

    /// The sender tag stamped on frames this role produces.
    pub fn as_sender(&self) -> SenderRole {
        match self {
            ClientRole::Customer => SenderRole::Customer,
            ClientRole::Agent => SenderRole::Agent,
        }
    }
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(ClientRole::Customer),
            "agent" => Ok(ClientRole::Agent),
            _ => Err(ValidationError::invalid_format(
                "client_type",
                "must be 'agent' or 'customer'",
            )),
        }
    }
}

/// Author tag carried in the wire envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Agent,
    Customer,
    System,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Agent => "agent",
            SenderRole::Customer => "customer",
            SenderRole::System => "system",
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_role_parses_known_values() {
        assert_eq!("agent".parse::<ClientRole>().unwrap(), ClientRole::Agent);
        assert_eq!(
            "customer".parse::<ClientRole>().unwrap(),
            ClientRole::Customer
        );
    }

    #[test]
    fn client_role_rejects_unknown_values() {
        assert!("admin".parse::<ClientRole>().is_err());
        assert!("Agent".parse::<ClientRole>().is_err());
    }

    #[test]
    fn sender_role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SenderRole::System).unwrap(),
            r#""system""#
        );
    }

    #[test]
    fn client_role_maps_to_sender() {
        assert_eq!(ClientRole::Agent.as_sender(), SenderRole::Agent);
        assert_eq!(ClientRole::Customer.as_sender(), SenderRole::Customer);
    }
}
