//! Kernel introspection helpers.

use std::fmt;

use anyhow::{anyhow, Result};
#[cfg(not(test))]
use nix::sys::utsname::uname;

/// Represents a kernel version, eg. 6.2.14-300.fc38.x86_64
#[derive(Clone, Debug)]
pub struct KernelVersion {
    /// Major number, eg. 6.
    major: u32,
    /// Minor number, eg. 2.
    minor: u32,
    /// Patch number, eg. 14.
    patch: u32,
    /// Full kernel release version, same as `$(uname -r)`, eg.
    /// 6.2.14-300.fc38.x86_64.
    full: String,
}

impl KernelVersion {
    /// Retrieve the version of the running kernel.
    pub fn new() -> Result<Self> {
        Self::parse(
            #[cfg(not(test))]
            uname()
                .map_err(|e| anyhow!("Failed to get kernel version information: {e}"))?
                .release()
                .to_str()
                .ok_or_else(|| anyhow!("Could not convert kernel version to str"))?,
            #[cfg(test)]
            "6.2.14-300.fc38.x86_64",
        )
    }

    /// Parse a version string of the `$(uname -r)` form into a KernelVersion.
    pub fn parse(version: &str) -> Result<Self> {
        let mut parts = version.split('.');

        let major: u32 = parts
            .next()
            .ok_or_else(|| anyhow!("Could not get kernel major version from {version}"))?
            .parse()?;
        let minor: u32 = parts
            .next()
            .ok_or_else(|| anyhow!("Could not get kernel minor version from {version}"))?
            .parse()?;
        let patch: u32 = parts
            .next()
            .ok_or_else(|| anyhow!("Could not get kernel patch version from {version}"))?
            .split('-')
            .next()
            .ok_or_else(|| anyhow!("Could not get kernel patch version from {version}"))?
            .trim_end_matches('+')
            .parse()?;

        Ok(KernelVersion {
            major,
            minor,
            patch,
            full: version.to_string(),
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_version() {
        let version = KernelVersion::new().unwrap();
        assert_eq!(version.major, 6);
        assert_eq!(version.minor, 2);
        assert_eq!(version.patch, 14);
        assert_eq!(version.full, "6.2.14-300.fc38.x86_64");

        let version = KernelVersion::parse("6.2.0-20-generic").unwrap();
        assert_eq!(version.major(), 6);
        assert_eq!(version.minor(), 2);
        assert_eq!(version.patch(), 0);

        let version = KernelVersion::parse("2.6.32-431.el6.x86_64").unwrap();
        assert_eq!(version.major(), 2);
        assert_eq!(version.minor(), 6);
        assert_eq!(version.patch(), 32);

        let version = KernelVersion::parse("6.4.12-arch1-1").unwrap();
        assert_eq!(version.major, 6);
        assert_eq!(version.minor, 4);
        assert_eq!(version.patch, 12);

        assert!(KernelVersion::parse("6.2").is_err());
        assert!(KernelVersion::parse("generic").is_err());
    }
}
