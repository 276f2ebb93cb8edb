//! Server versions and dialect selection.
//!
//! Greenplum changed catalog columns between major releases
//! (`procpid` became `pid`, `current_query` became `query`, ...).
//! Collectors never compare versions by hand; they declare a
//! `DialectTable` keyed by major-version range and ask it for the
//! variant matching the connected server.

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Matches the product banner embedded in `select version()`, e.g.
/// `PostgreSQL 9.4.24 (Greenplum Database 6.20.0 build commit:...)`.
static BANNER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Greenplum Database (\d{1,})\.\d{1,}\.\d{1,}")
        .expect("banner pattern is a valid regex")
});

/// Major version of the connected server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion(u32);

impl ServerVersion {
    /// Wrap a raw major version number.
    pub const fn new(major: u32) -> Self {
        Self(major)
    }

    /// The major version number.
    pub const fn major(self) -> u32 {
        self.0
    }

    /// Extract the major version from a `version()` banner.
    ///
    /// Returns `None` when the banner does not name the product or the
    /// number does not fit a `u32`.
    pub fn from_banner(banner: &str) -> Option<Self> {
        let captures = BANNER_PATTERN.captures(banner)?;
        captures.get(1)?.as_str().parse().ok().map(Self)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One version-specific variant in a `DialectTable`.
#[derive(Debug)]
pub struct Dialect<T> {
    /// Major versions (half-open) this variant applies to.
    pub versions: Range<u32>,
    /// The variant itself, usually query text.
    pub value: T,
}

/// Version-keyed lookup shared by collectors.
///
/// Ranges are checked in declaration order; the first match wins.
/// Versions outside every range get the fallback, which should be the
/// current dialect so unknown future releases take the newest path.
#[derive(Debug)]
pub struct DialectTable<T: 'static> {
    dialects: &'static [Dialect<T>],
    fallback: T,
}

impl<T> DialectTable<T> {
    /// Build a table usable in `static` items.
    pub const fn new(dialects: &'static [Dialect<T>], fallback: T) -> Self {
        Self { dialects, fallback }
    }

    /// Pick the variant for `version`.
    pub fn select(&self, version: ServerVersion) -> &T {
        self.dialects
            .iter()
            .find(|d| d.versions.contains(&version.major()))
            .map(|d| &d.value)
            .unwrap_or(&self.fallback)
    }
}
