#[cfg(target_env = "gnu")]
pub type IoctlRequest = libc::c_ulong;
#[cfg(not(target_env = "gnu"))]
pub type IoctlRequest = libc::c_int;

pub const SIOCGIFADDR: IoctlRequest = 0x8915;
pub const SIOCGIFHWADDR: IoctlRequest = 0x8927;
