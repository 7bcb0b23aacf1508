pub mod dry_run;
pub mod remote;

#[cfg(test)]
pub mod mock;
