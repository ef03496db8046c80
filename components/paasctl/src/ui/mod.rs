pub mod ui;

#[cfg(test)]
pub mod testing;
