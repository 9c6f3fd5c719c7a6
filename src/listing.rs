// src/listing.rs
use std::fmt;

use crate::inode::Attributes;

/// Filter tokens of `list`: `-h` shows hidden files, `-a` appends the attribute byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub show_hidden: bool,
    pub show_attributes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub attributes: Attributes,
    pub size: u64,
}

/// Result of `list`, in directory-slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub entries: Vec<ListEntry>,
    pub show_attributes: bool,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("no files found");
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            if self.show_attributes {
                write!(f, "{} {:08b}", entry.name, entry.attributes.bits())?;
            } else {
                f.write_str(&entry.name)?;
            }
        }
        Ok(())
    }
}

/// Bytes returned by `read`, shown as space separated hex pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexDump(pub Vec<u8>);

impl HexDump {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HexDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, attributes: Attributes) -> ListEntry {
        ListEntry {
            name: name.into(),
            attributes,
            size: 0,
        }
    }

    #[test]
    fn empty_listing_says_so() {
        let listing = Listing {
            entries: vec![],
            show_attributes: true,
        };
        assert_eq!(listing.to_string(), "no files found");
    }

    #[test]
    fn attribute_byte_is_binary() {
        let listing = Listing {
            entries: vec![
                entry("a.txt", Attributes::empty()),
                entry("b.txt", Attributes::HIDDEN | Attributes::READONLY),
            ],
            show_attributes: true,
        };
        assert_eq!(listing.to_string(), "a.txt 00000000\nb.txt 00000011");

        let plain = Listing {
            show_attributes: false,
            ..listing
        };
        assert_eq!(plain.to_string(), "a.txt\nb.txt");
    }

    #[test]
    fn hex_dump() {
        assert_eq!(HexDump(vec![0x0a, 0xff, 0x00]).to_string(), "0a ff 00");
        assert_eq!(HexDump(vec![]).to_string(), "");
    }
}
