//! Git object formats as they appear on the wire. A remote only ever tells us hex object ids,
//! so the format is recovered from the length of those ids and reported back to git through the
//! `:object-format` directive of the remote-helper protocol.

/// The [`HashKind`] enum represents the object formats git understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HashKind {
    #[default]
    Sha1,
    Sha256,
}

impl HashKind {
    /// Length of an object id of this kind in hex characters.
    pub const fn hex_len(&self) -> usize {
        match self {
            HashKind::Sha1 => 40,
            HashKind::Sha256 => 64,
        }
    }

    /// Name used by the `:object-format` directive.
    pub const fn as_str(&self) -> &'static str {
        match self {
            HashKind::Sha1 => "sha1",
            HashKind::Sha256 => "sha256",
        }
    }

    /// Infers the object format from the length of a hex encoded object id.
    pub fn from_hex_len(len: usize) -> Option<HashKind> {
        [HashKind::Sha1, HashKind::Sha256]
            .into_iter()
            .find(|kind| kind.hex_len() == len)
    }
}

impl std::fmt::Display for HashKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use crate::hash::HashKind;

    #[test]
    fn test_from_hex_len() {
        assert_eq!(HashKind::from_hex_len(40), Some(HashKind::Sha1));
        assert_eq!(HashKind::from_hex_len(64), Some(HashKind::Sha256));
        assert_eq!(HashKind::from_hex_len(0), None);
        assert_eq!(HashKind::from_hex_len(41), None);
    }

    #[test]
    fn test_object_format_names() {
        assert_eq!(HashKind::default(), HashKind::Sha1);
        assert_eq!(HashKind::Sha1.to_string(), "sha1");
        assert_eq!(HashKind::Sha256.to_string(), "sha256");
    }
}
