//! Identity provider identifiers

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// `OAuth2` identity provider supported for sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuth2Provider {
    /// Google Workspace / Gmail
    Google,
    /// Microsoft Entra ID (Office 365)
    Microsoft,
    /// Procore construction management
    Procore,
}

impl OAuth2Provider {
    /// Every provider known to this build, in display order
    pub const ALL: [Self; 3] = [Self::Google, Self::Microsoft, Self::Procore];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Microsoft => "microsoft",
            Self::Procore => "procore",
        }
    }

    /// Human readable name for login buttons and messages
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Microsoft => "Microsoft Office 365",
            Self::Procore => "Procore",
        }
    }

    /// Prefix of the environment variables holding this provider's credentials
    #[must_use]
    pub const fn env_prefix(&self) -> &'static str {
        match self {
            Self::Google => "GOOGLE",
            Self::Microsoft => "MICROSOFT",
            Self::Procore => "PROCORE",
        }
    }
}

impl FromStr for OAuth2Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "microsoft" => Ok(Self::Microsoft),
            "procore" => Ok(Self::Procore),
            _ => Err(format!("Unknown OAuth2 provider: {s}")),
        }
    }
}

impl std::fmt::Display for OAuth2Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
