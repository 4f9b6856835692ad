use crate::cluster::ServerId;
use crate::storage::{PersistenceError, Term};

/// DurableValue is a scalar that lives in memory and on stable storage. `value()`/`set_value()`
/// only touch the in-memory copy. Nothing reaches the disk until `write()` is called.
#[async_trait::async_trait]
pub trait DurableValue<V>: Send + Sync
where
    V: Send + 'static,
{
    /// Replaces the in-memory value with the stored one.
    async fn read(&mut self) -> Result<(), PersistenceError>;

    /// Flushes the in-memory value to storage.
    async fn write(&mut self) -> Result<(), PersistenceError>;

    async fn exists(&self) -> Result<bool, PersistenceError>;

    fn value(&self) -> &V;

    fn set_value(&mut self, value: V);

    async fn read_if_exists_else_set_and_write(&mut self, default: V) -> Result<(), PersistenceError> {
        if self.exists().await? {
            self.read().await
        } else {
            self.set_value(default);
            self.write().await
        }
    }
}

/// Persist is the text form a value takes in its file.
pub trait Persist: Sized {
    fn to_text(&self) -> String;
    fn from_text(text: &str) -> Result<Self, String>;
}

impl Persist for Term {
    fn to_text(&self) -> String {
        self.as_u64().to_string()
    }

    fn from_text(text: &str) -> Result<Self, String> {
        text.trim()
            .parse::<u64>()
            .map(Term::new)
            .map_err(|e| format!("invalid term {:?}: {}", text, e))
    }
}

// Empty text means no vote.
impl Persist for Option<ServerId> {
    fn to_text(&self) -> String {
        match self {
            Some(id) => id.as_str().to_string(),
            None => String::new(),
        }
    }

    fn from_text(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ServerId::new(text)))
        }
    }
}
