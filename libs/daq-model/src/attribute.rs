//! Attribute descriptors
//!
//! Attributes are resolved by name and carry their access flags and data type,
//! so a host can decide up front whether to ask for a read or a write handle.

use std::fmt;

use crate::types::DataType;

/// Access flags of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn is_readable(&self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

/// An attribute exposed by a data point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    name: &'static str,
    access: Access,
    data_type: DataType,
}

impl Attribute {
    pub const fn new(name: &'static str, access: Access, data_type: DataType) -> Self {
        Self {
            name,
            access,
            data_type,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Find the attribute called `name` in a list of candidates
    pub fn resolve(name: &str, candidates: &[Attribute]) -> Option<Attribute> {
        candidates.iter().find(|a| a.name == name).copied()
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.data_type)
    }
}

/// Well-known attributes shared by every driver element
pub mod attributes {
    use super::{Access, Attribute};
    use crate::types::DataType;

    /// Name of the value attribute; its type and access depend on the point
    pub const VALUE: &str = "value";

    pub const UPDATE_TIME: Attribute =
        Attribute::new("updateTime", Access::ReadOnly, DataType::Timestamp);
    pub const CHANGE_TIME: Attribute =
        Attribute::new("changeTime", Access::ReadOnly, DataType::Timestamp);
    pub const QUALITY: Attribute = Attribute::new("quality", Access::ReadOnly, DataType::Quality);
    pub const ERROR: Attribute = Attribute::new("error", Access::ReadOnly, DataType::ErrorCode);
    pub const WRITE_TIME: Attribute =
        Attribute::new("writeTime", Access::ReadOnly, DataType::Timestamp);
    pub const WRITE_ERROR: Attribute =
        Attribute::new("writeError", Access::ReadOnly, DataType::ErrorCode);
}

/// Well-known event names
pub mod events {
    /// Raised on every transaction read, successful or not
    pub const READ: &str = "read";
    pub const VALUE_CHANGED: &str = "valueChanged";
    pub const QUALITY_CHANGED: &str = "qualityChanged";
    pub const ERROR_CHANGED: &str = "errorChanged";
    /// Raised after a successful write
    pub const WRITTEN: &str = "written";
    /// Raised after a failed write
    pub const WRITE_ERROR: &str = "writeError";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_name() {
        let candidates = [attributes::QUALITY, attributes::ERROR];
        assert_eq!(
            Attribute::resolve("error", &candidates),
            Some(attributes::ERROR)
        );
        assert_eq!(Attribute::resolve("missing", &candidates), None);
    }

    #[test]
    fn test_access_flags() {
        assert!(Access::ReadWrite.is_writable());
        assert!(Access::ReadWrite.is_readable());
        assert!(!Access::ReadOnly.is_writable());
        assert!(!Access::WriteOnly.is_readable());
    }
}
