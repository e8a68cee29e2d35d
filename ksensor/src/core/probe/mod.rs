//! Kernel probe descriptions and the compatibility machinery needed to make
//! them fire on every supported kernel.

pub(crate) mod compat;
pub(crate) mod dummy;

use std::fmt;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Describes a dynamic kprobe registration request: the target symbol, the
/// probe direction and the fetch-arg description of what to read from the
/// register/memory state when it fires. Ephemeral, consumed per registration
/// call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KprobeSpec<'a> {
    pub symbol: &'a str,
    pub is_return: bool,
    /// Space-separated `name=OFFSET(REGISTER):TYPE` tokens. The offsets
    /// encode the kernel ABI of the probed function on the target
    /// architecture; they are fixed per symbol, never inferred at runtime.
    pub fetch_args: &'a str,
}

impl fmt::Display for KprobeSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.is_return {
            false => write!(f, "kprobe:{}", self.symbol),
            true => write!(f, "kretprobe:{}", self.symbol),
        }
    }
}

/// One fetch-arg token: `name=` followed by a bare register (`%di`), a
/// register dereference (`+0(%si)`) or a doubly indirected one
/// (`+2(+0(%si))` for arguments reached through a pointer-to-struct
/// parameter), with an optional `:TYPE` suffix.
static FETCH_ARG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-z_][a-z0-9_]*=(?:%[a-z0-9]+|[+-]?\d+\((?:%[a-z0-9]+|[+-]?\d+\(%[a-z0-9]+\))\))(?::(?:s64|u16|u32|u64|string))?$",
    )
    .unwrap()
});

/// Check a fetch-arg description against the grammar before handing it to the
/// engine. A wrong offset silently yields garbage in the kernel, but a
/// malformed token can at least be caught here.
pub(crate) fn validate_fetch_args(fetch_args: &str) -> Result<()> {
    for token in fetch_args.split(' ') {
        if !FETCH_ARG_RE.is_match(token) {
            bail!("Invalid fetch-arg token: {token}");
        }
    }
    Ok(())
}
