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
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

pub const MIN_LENGTH: usize = 12;

/// A password that has already passed the length/character-class policy.
/// Display is masked so it never leaks into logs accidentally.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_policy(s: &str) -> Result<(), String> {
    if s.chars().count() < MIN_LENGTH {
        return Err(format!("password must be at least {MIN_LENGTH} characters long"));
    }
    let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = s.chars().any(|c| c.is_ascii_digit());
    let has_special = s.chars().any(|c| !c.is_ascii_alphanumeric());
    if !(has_upper && has_lower && has_digit && has_special) {
        return Err(
            "password must contain an uppercase letter, a lowercase letter, a digit and a special character"
                .to_string(),
        );
    }
    Ok(())
}

impl FromStr for Password {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_policy(s)?;
        Ok(Password(s.to_string()))
    }
}

impl TryFrom<String> for Password {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Password(********)")
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_strong_password() {
        let pw: Password = serde_json::from_str(r#""Tr0ub4dor&3!!""#).unwrap();
        assert_eq!(pw.as_str(), "Tr0ub4dor&3!!");
    }

    #[test]
    fn rejects_too_short() {
        let pw: Result<Password, _> = serde_json::from_str(r#""Sh0rt!""#);
        assert!(pw.is_err());
    }

    #[test]
    fn rejects_missing_special_char() {
        let pw: Result<Password, _> = serde_json::from_str(r#""NoSpecialChar123""#);
        assert!(pw.is_err());
    }

    #[test]
    fn display_is_masked() {
        let pw: Password = serde_json::from_str(r#""Tr0ub4dor&3!!""#).unwrap();
        assert_eq!(format!("{pw}"), "********");
    }
}
