use std::convert::TryFrom;
use tokio::time::Duration;

/// ServerOptions are the tunable timings. Anything left as `None` gets a default.
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    /// Default 150ms.
    pub election_timeout_min: Option<Duration>,
    /// Default 300ms.
    pub election_timeout_max: Option<Duration>,
    /// Default 50ms.
    pub heartbeat_interval: Option<Duration>,
}

#[derive(Debug)]
pub(super) struct ServerOptionsValidated {
    pub election_timeout_min: Duration,
    pub election_timeout_max: Duration,
    pub heartbeat_interval: Duration,
}

impl ServerOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.election_timeout_min > self.election_timeout_max {
            return Err("Election timeout minimum must not be greater than its maximum");
        }
        if self.heartbeat_interval >= self.election_timeout_min {
            return Err("Heartbeat interval must be less than the minimum election timeout");
        }
        if self.heartbeat_interval == Duration::from_secs(0) {
            return Err("Heartbeat interval must not be zero");
        }

        Ok(())
    }
}

impl TryFrom<ServerOptions> for ServerOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ServerOptions) -> Result<Self, Self::Error> {
        let values = ServerOptionsValidated {
            election_timeout_min: options.election_timeout_min.unwrap_or(Duration::from_millis(150)),
            election_timeout_max: options.election_timeout_max.unwrap_or(Duration::from_millis(300)),
            heartbeat_interval: options.heartbeat_interval.unwrap_or(Duration::from_millis(50)),
        };

        values.validate()?;
        Ok(values)
    }
}
