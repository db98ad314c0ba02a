/// Server settings read from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Capacity of the shared store event channel.
    pub event_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            event_buffer_size: 1000,
        }
    }
}

impl ServerConfig {
    /// Reads `BIND_ADDRESS` and `EVENT_BUFFER_SIZE`, keeping defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind_address) = lookup("BIND_ADDRESS") {
            config.bind_address = bind_address;
        }

        if let Some(size) = lookup("EVENT_BUFFER_SIZE") {
            match size.parse::<usize>() {
                Ok(size) if size > 0 => config.event_buffer_size = size,
                _ => tracing::warn!(
                    "Ignoring EVENT_BUFFER_SIZE={:?}, using {}",
                    size,
                    config.event_buffer_size
                ),
            }
        }

        config
    }
}
