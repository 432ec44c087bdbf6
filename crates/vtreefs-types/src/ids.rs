strong_type!(InodeNo, u64);
strong_type!(Uid, u32);
strong_type!(Gid, u32);
strong_type!(DevNo, u64);

/// Inode number of the tree root. Numbers are 1-based arena slots.
pub const ROOT_INODE_NO: InodeNo = InodeNo(1);

/// The super-user id; bypasses directory search checks.
pub const SUPER_USER: Uid = Uid(0);
