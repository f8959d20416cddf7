//! Error code constants

pub mod error_codes {
    /// Internal server error (500)
    pub const E1000_INTERNAL_SERVER_ERROR: &str = "E1000";
    /// Invalid request parameters (400)
    pub const E1001_INVALID_REQUEST: &str = "E1001";
    /// LSP server error
    pub const E1003_LSP_ERROR: &str = "E1003";
    /// Operation timeout
    pub const E1004_TIMEOUT: &str = "E1004";
    /// Resource not found (404)
    pub const E1006_RESOURCE_NOT_FOUND: &str = "E1006";
    /// Operation not supported
    pub const E1007_NOT_SUPPORTED: &str = "E1007";
    /// Invalid data format
    pub const E1008_INVALID_DATA: &str = "E1008";
    /// Validation error
    pub const E1010_VALIDATION_ERROR: &str = "E1010";
    /// Plugin error
    pub const E1014_PLUGIN_ERROR: &str = "E1014";
    /// Configuration error
    pub const E1019_CONFIG_ERROR: &str = "E1019";
    /// Resource already exists
    pub const E1022_ALREADY_EXISTS: &str = "E1022";

    // Refactor engine codes
    /// File changed since the plan was computed
    pub const E1030_STALE_CHECKSUM: &str = "E1030";
    /// Two edits or operations collide
    pub const E1031_CONFLICT: &str = "E1031";
    /// Lock wait exceeded its bound
    pub const E1032_BUSY: &str = "E1032";
    /// External dependency degraded
    pub const E1033_UNAVAILABLE: &str = "E1033";
    /// Symbol could not be resolved
    pub const E1034_SYMBOL_NOT_FOUND: &str = "E1034";
    /// Operation cancelled before mutation
    pub const E1035_CANCELLED: &str = "E1035";
}
