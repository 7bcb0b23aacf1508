pub mod engine;
pub mod runtime;

#[cfg(test)]
mod tests;
