use std::fmt;

/// ServerId uniquely identifies a server within a cluster.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        ServerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        ServerId::new(id)
    }
}

impl From<String> for ServerId {
    fn from(id: String) -> Self {
        ServerId(id)
    }
}

/// Endpoint is where a cluster member can be reached.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Endpoint {
    id: ServerId,
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(id: impl Into<ServerId>, host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    pub fn id(&self) -> &ServerId {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `address()` is the `host:port` pair used to open a socket to this endpoint.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.host, self.port)
    }
}
