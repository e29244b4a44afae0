use std::fmt;

/// Operating system variants carbox knows how to reach a daemon on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

/// Host family used to pick the default daemon endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostFamily {
  Windows,
  Unix,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    Self::from_name(std::env::consts::OS)
  }

  /// Map an OS name as reported by `std::env::consts::OS`.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "macos",
      Self::Windows => "windows",
    }
  }

  pub fn family(&self) -> HostFamily {
    match self {
      Self::Windows => HostFamily::Windows,
      Self::Linux | Self::MacOs => HostFamily::Unix,
    }
  }
}

impl HostFamily {
  /// Family of the running host.
  ///
  /// Unrecognised operating systems are treated as Unix-like; only Windows
  /// uses a different daemon convention.
  pub fn current() -> Self {
    Self::from_os_name(std::env::consts::OS)
  }

  pub fn from_os_name(name: &str) -> Self {
    Os::from_name(name).map(|os| os.family()).unwrap_or(HostFamily::Unix)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Windows => "windows",
      Self::Unix => "unix",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl fmt::Display for HostFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
