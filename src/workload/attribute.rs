use serde::{Deserialize, Serialize};

/// A table attribute: a name plus its storage size in bytes.
///
/// Attributes are immutable once the workload is fixed; every component
/// downstream of the snapshot refers to them only by index and byte size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Storage size of one value in bytes.
    pub size: u32,
}

impl Attribute {
    pub fn new(name: impl Into<String>, size: u32) -> Self {
        Attribute {
            name: name.into(),
            size,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Attribute::new(name, 4)
    }

    pub fn bigint(name: impl Into<String>) -> Self {
        Attribute::new(name, 8)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Attribute::new(name, 4)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Attribute::new(name, 8)
    }

    pub fn char(name: impl Into<String>, length: u32) -> Self {
        Attribute::new(name, length)
    }

    /// Variable-length character type; sized as the maximum length plus a
    /// one-byte length prefix.
    pub fn varchar(name: impl Into<String>, length: u32) -> Self {
        Attribute::new(name, length + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_sizes() {
        assert_eq!(Attribute::integer("a").size, 4);
        assert_eq!(Attribute::bigint("a").size, 8);
        assert_eq!(Attribute::double("a").size, 8);
        assert_eq!(Attribute::char("a", 25).size, 25);
        assert_eq!(Attribute::varchar("a", 60).size, 61);
    }
}
