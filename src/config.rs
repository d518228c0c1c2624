//! Code configuration from TOML.
//!
//! ```toml
//! family = "cauchy_good"
//! k = 6
//! m = 3
//! w = 8
//! packet_size = 64
//! ```
//!
//! `packet_size` and `buffer_size` may be left out and default to 0. The
//! family also accepts the short names `reed_sol_van` and `cauchy_orig`.
use serde::{Deserialize, Serialize};

use crate::code::Code;
use crate::error::{Error, Result};
use crate::family::CodeFamily;
use crate::params::CodeParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeConfig {
    pub family: CodeFamily,
    #[serde(flatten)]
    pub parameters: CodeParameters,
}

impl CodeConfig {
    pub fn new(family: CodeFamily, parameters: CodeParameters) -> Self {
        Self { family, parameters }
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the configuration and build the code.
    pub fn build(&self) -> Result<Code> {
        Code::new(self.family, self.parameters)
    }
}
