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
use std::fmt::Display;

/// A type that knows how to validate its own contained data.
pub trait ValueObjectable: Display {
    type DataType;
    fn validate(&self) -> Result<(), String>;
    fn get_value(&self) -> &Self::DataType;
}

/// Wraps a `ValueObjectable` so the only way to construct one is through
/// validation: there is no bare constructor for the inner data.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueObject<DataType>(DataType);

impl<DataType> ValueObject<DataType>
where
    DataType: ValueObjectable,
{
    pub fn new(data: DataType) -> Result<ValueObject<DataType>, String> {
        data.validate()?;
        Ok(ValueObject(data))
    }
}

impl<DataType> ValueObject<DataType> {
    pub fn extract(&self) -> &DataType {
        &self.0
    }

    pub fn into_inner(self) -> DataType {
        self.0
    }
}

impl<DataType> Display for ValueObject<DataType>
where
    DataType: Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<DataType> serde::Serialize for ValueObject<DataType>
where
    DataType: Display,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}
