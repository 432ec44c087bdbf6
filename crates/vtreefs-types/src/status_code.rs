/// Numeric status code carried by every `Status`.
#[allow(non_camel_case_types)]
pub type status_code_t = u16;

/// Generic status codes (0-999).
pub mod StatusCode {
    use super::status_code_t;

    pub const OK: status_code_t = 0;
    pub const NOT_SUPPORTED: status_code_t = 1;
    pub const INVALID_ARG: status_code_t = 3;
    pub const INVALID_CONFIG: status_code_t = 4;
    pub const IO_ERROR: status_code_t = 69;
    pub const FOUND_BUG: status_code_t = 998;
    pub const UNKNOWN: status_code_t = 999;
}

/// Virtual-tree engine status codes (3xxx).
pub mod VtreeCode {
    use super::status_code_t;

    pub const NOT_FOUND: status_code_t = 3000;
    pub const ALREADY_EXISTS: status_code_t = 3001;
    pub const NOT_DIRECTORY: status_code_t = 3003;
    pub const TOO_MANY_LINKS: status_code_t = 3005;
    pub const ACCESS_DENIED: status_code_t = 3008;
    pub const OUT_OF_NODES: status_code_t = 3012;
    pub const NAME_TOO_LONG: status_code_t = 3017;
    pub const BUSY: status_code_t = 3019;
    /// Redirect: resolution left the tree through `..` at its root.
    pub const LEAVE_BOUNDARY: status_code_t = 3100;
    /// Redirect: resolution hit an absolute symlink target.
    pub const IS_SYMLINK: status_code_t = 3101;
}

/// Human-readable name of a status code.
pub fn to_string(code: status_code_t) -> &'static str {
    match code {
        StatusCode::OK => "OK",
        StatusCode::NOT_SUPPORTED => "NotSupported",
        StatusCode::INVALID_ARG => "InvalidArg",
        StatusCode::INVALID_CONFIG => "InvalidConfig",
        StatusCode::IO_ERROR => "IOError",
        StatusCode::FOUND_BUG => "FoundBug",
        StatusCode::UNKNOWN => "Unknown",

        VtreeCode::NOT_FOUND => "Vtree::NotFound",
        VtreeCode::ALREADY_EXISTS => "Vtree::AlreadyExists",
        VtreeCode::NOT_DIRECTORY => "Vtree::NotDirectory",
        VtreeCode::TOO_MANY_LINKS => "Vtree::TooManyLinks",
        VtreeCode::ACCESS_DENIED => "Vtree::AccessDenied",
        VtreeCode::OUT_OF_NODES => "Vtree::OutOfNodes",
        VtreeCode::NAME_TOO_LONG => "Vtree::NameTooLong",
        VtreeCode::BUSY => "Vtree::Busy",
        VtreeCode::LEAVE_BOUNDARY => "Vtree::LeaveBoundary",
        VtreeCode::IS_SYMLINK => "Vtree::IsSymlink",

        _ => "Unknown",
    }
}

/// POSIX errno a request layer sends back for a status code.
///
/// The two redirect codes have no errno of their own; transports encode
/// them out of band and this returns `EINVAL` if one leaks through.
pub fn to_errno(code: status_code_t) -> i32 {
    match code {
        StatusCode::OK => 0,
        StatusCode::NOT_SUPPORTED => libc::ENOSYS,
        StatusCode::INVALID_ARG | StatusCode::INVALID_CONFIG => libc::EINVAL,
        VtreeCode::NOT_FOUND => libc::ENOENT,
        VtreeCode::ALREADY_EXISTS => libc::EEXIST,
        VtreeCode::NOT_DIRECTORY => libc::ENOTDIR,
        VtreeCode::TOO_MANY_LINKS => libc::ELOOP,
        VtreeCode::ACCESS_DENIED => libc::EACCES,
        VtreeCode::OUT_OF_NODES => libc::ENFILE,
        VtreeCode::NAME_TOO_LONG => libc::ENAMETOOLONG,
        VtreeCode::BUSY => libc::EBUSY,
        VtreeCode::LEAVE_BOUNDARY | VtreeCode::IS_SYMLINK => libc::EINVAL,
        _ => libc::EIO,
    }
}

/// Whether the code is one of the resolver's redirect signals.
pub fn is_redirect(code: status_code_t) -> bool {
    matches!(code, VtreeCode::LEAVE_BOUNDARY | VtreeCode::IS_SYMLINK)
}
