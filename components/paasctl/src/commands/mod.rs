pub mod common;
pub mod logs;
pub mod restage;
pub mod restart;
pub mod start;

#[cfg(test)]
mod tests;
