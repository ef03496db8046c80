pub mod load_config;
pub mod shutdown;

#[cfg(test)]
mod tests;
