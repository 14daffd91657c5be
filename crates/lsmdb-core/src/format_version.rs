/// File format versions for lsmdb
///
/// The database lives in a single file. These constants identify the
/// header slots, write-ahead log frames and segment chunks inside it.
/// Header format version
pub const HEADER_FORMAT_VERSION: u16 = 1;

/// WAL frame format version
pub const WAL_FORMAT_VERSION: u16 = 1;

/// Segment format version
pub const SEGMENT_FORMAT_VERSION: u16 = 1;

/// Magic numbers for file validation
pub mod magic {
    /// Header slot magic: "LSMH"
    pub const HEADER: u32 = 0x4C53_4D48;

    /// Segment index magic: "LSMS"
    pub const SEGMENT: u32 = 0x4C53_4D53;
}

/// Version compatibility information
pub struct FormatVersion {
    /// Current version of this format
    pub current: u16,
    /// Minimum supported version for reading
    pub min_read: u16,
}

impl FormatVersion {
    /// Check if a version can be read
    pub fn can_read(&self, version: u16) -> bool {
        version >= self.min_read && version <= self.current
    }
}

/// Header format version info
pub fn header_version() -> FormatVersion {
    FormatVersion {
        current: HEADER_FORMAT_VERSION,
        min_read: 1,
    }
}

/// Segment format version info
pub fn segment_version() -> FormatVersion {
    FormatVersion {
        current: SEGMENT_FORMAT_VERSION,
        min_read: 1,
    }
}
