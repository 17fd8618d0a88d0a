pub mod level;
pub mod record;
pub mod format;
pub mod sink;
pub mod layer;

pub mod config;
pub mod tls;
pub mod transport;
pub mod pool;
pub mod insightops;

pub mod init;
pub mod env;
pub mod dsn;

#[cfg(test)]
mod test_support;
