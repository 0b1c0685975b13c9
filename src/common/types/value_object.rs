/*
 * This file is part of the Obvia ERP.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
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
use serde::Deserialize;
use std::fmt::Display;

/// A container for domain data that can only be constructed once validated.
pub trait ValueObjectable: Display {
    type DataType;
    fn validate(&self) -> Result<(), String>;
    #[allow(dead_code)]
    fn get_value(&self) -> &Self::DataType;
}

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
    #[allow(dead_code)]
    pub fn extract(&self) -> &DataType {
        &self.0
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

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct SampleObject(String);

    impl ValueObjectable for SampleObject {
        type DataType = String;
        fn validate(&self) -> Result<(), String> {
            if self.0 == "sample_object" {
                Ok(())
            } else {
                Err(String::from("Invalid sample object!"))
            }
        }
        fn get_value(&self) -> &Self::DataType {
            &self.0
        }
    }

    impl Display for SampleObject {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl<'de> Deserialize<'de> for ValueObject<SampleObject> {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            ValueObject::new(SampleObject(s)).map_err(serde::de::Error::custom)
        }
    }

    #[test]
    fn validates_on_construction() {
        let err = ValueObject::new(SampleObject("test".into())).unwrap_err();
        assert_eq!(err, "Invalid sample object!");
        let ok = ValueObject::new(SampleObject("sample_object".into())).unwrap();
        assert_eq!(ok.extract().get_value(), "sample_object");
    }
}
