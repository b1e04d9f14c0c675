/*
 * This file is part of the Taskflow backend.
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */
use crate::common::types::value_object::{ValueObject, ValueObjectable};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Names the reserved subdomains that never resolve to a tenant.
pub const RESERVED_SUBDOMAINS: &[&str] = &["www", "api", "app", "admin"];

#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize)]
pub struct Subdomain(pub String);

impl ValueObjectable for Subdomain {
    type DataType = String;

    fn validate(&self) -> Result<(), String> {
        if self.0.is_empty() || self.0.len() > 63 {
            return Err("subdomain must be between 1 and 63 characters".to_string());
        }
        if !self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err("subdomain may only contain letters, digits and hyphens".to_string());
        }
        if RESERVED_SUBDOMAINS.contains(&self.0.as_str()) {
            return Err(format!("'{}' is a reserved subdomain", self.0));
        }
        Ok(())
    }

    fn get_value(&self) -> &Self::DataType {
        &self.0
    }
}

impl Display for Subdomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ValueObject<Subdomain> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ValueObject::new(Subdomain(s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_subdomain() {
        let sub = ValueObject::new(Subdomain("acme-corp".to_string())).unwrap();
        assert_eq!(sub.extract().get_value(), "acme-corp");
    }

    #[test]
    fn rejects_reserved_subdomain() {
        assert!(ValueObject::new(Subdomain("admin".to_string())).is_err());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(ValueObject::new(Subdomain("acme_corp".to_string())).is_err());
    }
}
