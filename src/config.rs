/*
 * Escalator Configuration
 *
 * Load-time flags set once by the launcher before the policy is attached.
 * They are read-only for the whole session.
 *
 * - fifo_sched:     order the shared queue by arrival (on by default); turning
 *                   it off opts into weighted vtime ordering
 * - switch_partial: only schedule tasks that opted in, instead of every task
 *
 * The launcher can pass them as an option string, e.g.
 * "fifo_sched=0 switch_partial".
 */

/// Read-only policy configuration
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EscalatorConfig {
    /// Pure FIFO ordering (false = weighted vtime)
    pub fifo_sched: bool,

    /// Partial takeover (false = every task on the system)
    pub switch_partial: bool,
}

/// Errors from parsing a launcher option string
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Option name is not one the policy knows
    UnknownOption,
    /// Option value is not a boolean
    InvalidValue,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::UnknownOption => write!(f, "Unknown option"),
            ConfigError::InvalidValue => write!(f, "Invalid boolean value"),
        }
    }
}

impl EscalatorConfig {
    pub const fn new() -> Self {
        Self {
            fifo_sched: true,
            switch_partial: false,
        }
    }

    pub const fn fifo(mut self, fifo_sched: bool) -> Self {
        self.fifo_sched = fifo_sched;
        self
    }

    pub const fn partial(mut self, switch_partial: bool) -> Self {
        self.switch_partial = switch_partial;
        self
    }

    /// Parse whitespace-separated `key[=value]` options
    ///
    /// A bare key means `true`. Later occurrences win.
    pub fn parse(opts: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();

        for token in opts.split_whitespace() {
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, parse_bool(v)?),
                None => (token, true),
            };

            match key {
                "fifo_sched" | "fifo" => config.fifo_sched = value,
                "switch_partial" | "partial" => config.switch_partial = value,
                _ => {
                    log::warn!("[Escalator] Unknown option '{}'", key);
                    return Err(ConfigError::UnknownOption);
                }
            }
        }

        Ok(config)
    }
}

impl Default for EscalatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue),
    }
}
