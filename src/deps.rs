// src/deps.rs

//! Dependency model: requirements, provides, sense flags, namespaces
//!
//! A requirement is a named, optionally version-ranged dependency an
//! element declares. Its sense bitset records which class of relation it
//! is (plain, legacy prerequisite, scriptlet-phase ordering, discovered
//! automatically, hint, exclusion) and its namespace discriminator tags
//! system/environment probes that are never transaction-ordering
//! relevant.

use semver::{Version, VersionReq};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Sense-flag bitset for a requirement.
///
/// This is a bitset, not a single-choice enum: a scriptlet interpreter
/// dependency discovered automatically carries both bits. Version
/// comparison lives in the requirement's range, not here.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepSense(u32);

impl DepSense {
    /// Legacy combined install/erase prerequisite.
    pub const PREREQ: Self = Self(1 << 0);
    /// Interpreter used by a scriptlet.
    pub const INTERP: Self = Self(1 << 1);
    /// Needed by the pre-install script.
    pub const SCRIPT_PRE: Self = Self(1 << 2);
    /// Needed by the post-install script.
    pub const SCRIPT_POST: Self = Self(1 << 3);
    /// Needed by the pre-uninstall script.
    pub const SCRIPT_PREUN: Self = Self(1 << 4);
    /// Needed by the post-uninstall script.
    pub const SCRIPT_POSTUN: Self = Self(1 << 5);
    /// Needed by the verify script.
    pub const SCRIPT_VERIFY: Self = Self(1 << 6);
    /// Discovered by automatic dependency extraction.
    pub const FIND_REQUIRES: Self = Self(1 << 7);
    /// Soft suggestion; absence is not an error.
    pub const MISSINGOK: Self = Self(1 << 8);
    /// Exclusion entry (a conflict, not a requirement).
    pub const EXCLUDE: Self = Self(1 << 9);

    /// Bits that mark an entry as belonging to some requirement class
    /// beyond the bare legacy prerequisite bit.
    const REQUIRES_MASK: Self = Self(
        Self::INTERP.0
            | Self::SCRIPT_PRE.0
            | Self::SCRIPT_POST.0
            | Self::SCRIPT_PREUN.0
            | Self::SCRIPT_POSTUN.0
            | Self::SCRIPT_VERIFY.0
            | Self::FIND_REQUIRES.0
            | Self::MISSINGOK.0,
    );

    /// Bits that impose install-time script ordering.
    const INSTALL_ONLY: Self = Self(Self::SCRIPT_PRE.0 | Self::SCRIPT_POST.0);

    /// Bits that impose erase-time script ordering.
    const ERASE_ONLY: Self = Self(Self::SCRIPT_PREUN.0 | Self::SCRIPT_POSTUN.0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Whether this entry participates in automatic ordering. Exclusion
    /// entries never produce relations.
    pub const fn is_automatic(self) -> bool {
        !self.intersects(Self::EXCLUDE)
    }

    /// Legacy prerequisite: the combined bit with no modern requirement
    /// class alongside it.
    pub const fn is_legacy_prereq(self) -> bool {
        self.contains(Self::PREREQ) && (self.0 & Self::REQUIRES_MASK.0) == 0
    }

    /// Keep only the bits that oblige install-time ordering.
    pub const fn install_prereq(self) -> Self {
        Self(self.0 & Self::INSTALL_ONLY.0)
    }

    /// Keep only the bits that oblige erase-time ordering.
    pub const fn erase_prereq(self) -> Self {
        Self(self.0 & Self::ERASE_ONLY.0)
    }

    /// Strip the legacy prerequisite bit before classifying for display.
    const fn notpre(self) -> Self {
        Self(self.0 & !Self::PREREQ.0)
    }

    /// Display prefix naming the strongest class this requirement
    /// belongs to.
    pub fn identify(self) -> &'static str {
        let f = self.notpre();
        if f.intersects(Self::SCRIPT_PRE) {
            "Requires(pre):"
        } else if f.intersects(Self::SCRIPT_POST) {
            "Requires(post):"
        } else if f.intersects(Self::SCRIPT_PREUN) {
            "Requires(preun):"
        } else if f.intersects(Self::SCRIPT_POSTUN) {
            "Requires(postun):"
        } else if f.intersects(Self::SCRIPT_VERIFY) {
            "Requires(verify):"
        } else if f.intersects(Self::MISSINGOK) {
            "Requires(hint):"
        } else if f.intersects(Self::FIND_REQUIRES) {
            "Requires(auto):"
        } else {
            "Requires:"
        }
    }
}

impl BitOr for DepSense {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        DepSense(self.0 | rhs.0)
    }
}

impl BitOrAssign for DepSense {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Namespace discriminator for a requirement name.
///
/// System/environment probes are evaluated against the host, not against
/// other packages, so they never contribute ordering relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Ordinary package name.
    Plain,
    /// Filesystem path (`/usr/bin/sh`).
    Path,
    /// Shared library soname (`libc.so.6`).
    Soname,
    /// Package-manager internal feature probe.
    Internal,
    /// Configuration marker.
    Config,
    /// CPU capability probe.
    CpuInfo,
    /// System configuration probe.
    GetConf,
    /// Kernel/OS probe.
    Uname,
    /// File accessibility probe.
    Access,
    /// User existence probe.
    User,
    /// Group existence probe.
    Group,
    /// Mount point probe.
    Mounted,
    /// Free disk space probe.
    DiskSpace,
    /// File digest check.
    Digest,
    /// Detached signature check.
    Gnupg,
    /// Macro expansion probe.
    Macro,
    /// Environment variable probe.
    EnvVar,
    /// Running process probe.
    Running,
    /// Sanity check hook.
    Sanity,
    /// Version comparison probe.
    VersionCheck,
    /// Header signature check.
    Signature,
}

impl Namespace {
    /// Whether this namespace is a system/environment class that never
    /// participates in transaction ordering.
    pub fn is_probe(self) -> bool {
        !matches!(self, Namespace::Plain | Namespace::Path)
    }
}

/// A named, versioned dependency an element declares it needs.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: String,
    pub range: Option<VersionReq>,
    pub sense: DepSense,
    pub namespace: Namespace,
}

impl Requirement {
    /// Create a plain, unversioned requirement
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let namespace = if name.starts_with('/') {
            Namespace::Path
        } else {
            Namespace::Plain
        };
        Self {
            name,
            range: None,
            sense: DepSense::empty(),
            namespace,
        }
    }

    /// Create a requirement with a version range
    pub fn versioned(name: impl Into<String>, range: VersionReq) -> Self {
        let mut req = Self::new(name);
        req.range = Some(range);
        req
    }

    pub fn with_sense(mut self, sense: DepSense) -> Self {
        self.sense = sense;
        self
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }
}

impl fmt::Display for Requirement {
    /// Classified display form used by loop diagnostics, e.g.
    /// `Requires(pre): glibc >=2.34`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sense.identify(), self.name)?;
        if let Some(range) = &self.range {
            write!(f, " {}", range)?;
        }
        Ok(())
    }
}

/// A capability an element offers to requirement resolution.
#[derive(Debug, Clone)]
pub struct Provide {
    pub name: String,
    pub version: Option<Version>,
}

impl Provide {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn versioned(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }
}
