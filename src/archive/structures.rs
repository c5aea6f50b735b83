/// Per-entry flag bits stored in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(pub u8);

impl Flags {
    pub const NONE: Flags = Flags(0);
    pub const GZIP: Flags = Flags(0b01);
    pub const BROTLI: Flags = Flags(0b10);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Stored encoding of the payload. Gzip wins if both bits are set.
    pub fn encoding(self) -> Encoding {
        if self.contains(Flags::GZIP) {
            Encoding::Gzip
        } else if self.contains(Flags::BROTLI) {
            Encoding::Brotli
        } else {
            Encoding::Identity
        }
    }
}

/// How an entry's payload is stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Identity,
    Gzip,
    Brotli,
}

impl Encoding {
    /// Token used in `Content-Encoding` / `Accept-Encoding` headers.
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Encoding::Identity => None,
            Encoding::Gzip => Some("gzip"),
            Encoding::Brotli => Some("br"),
        }
    }
}

/// Compression applied by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

impl Compression {
    pub fn flags(&self) -> Flags {
        match self {
            Compression::None => Flags::NONE,
            Compression::Gzip => Flags::GZIP,
        }
    }
}

/// One packed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Forward-slash path relative to the input directory.
    pub path: String,
    /// Absolute offset of the payload in the archive.
    pub offset: u64,
    /// Stored (possibly compressed) payload length.
    pub length: u64,
    pub flags: Flags,
}

impl Entry {
    /// Exclusive end of the payload range, `None` if it does not fit in a `u64`.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    pub fn encoding(&self) -> Encoding {
        self.flags.encoding()
    }
}

/// Fixed record at the very end of every archive locating the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub index_offset: u64,
    pub index_length: u64,
}

impl Trailer {
    pub const SIZE: usize = 16;
}

/// Size of the index header (`entry_count: u32`).
pub const INDEX_HEADER_SIZE: usize = 4;

/// Fixed bytes per index entry besides the path: `path_len` + `offset` + `length` + `flags`.
pub const INDEX_ENTRY_FIXED_SIZE: usize = 2 + 8 + 8 + 1;

/// Longest path the 16-bit length field can describe.
pub const MAX_PATH_LEN: usize = u16::MAX as usize;
