use std::env;

use arm_cc::backend::BackendConfig;

/// Daemon configuration, sourced from environment variables in `main`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub backend: BackendConfig,
    /// Interpreter used to run uploaded program files.
    pub program_interpreter: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = env::var("CC_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CC_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(5500);
        let backend_addr =
            env::var("CC_BACKEND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let backend_port = env::var("CC_BACKEND_PORT")
            .ok()
            .and_then(|p| p.parse::<u32>().ok())
            .unwrap_or(12345);
        let program_interpreter =
            env::var("CC_PROGRAM_INTERPRETER").unwrap_or_else(|_| "python".to_string());
        Self {
            bind_addr,
            port,
            backend: BackendConfig::new(backend_addr, backend_port),
            program_interpreter,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5500,
            backend: BackendConfig::default(),
            program_interpreter: "python".to_string(),
        }
    }
}
