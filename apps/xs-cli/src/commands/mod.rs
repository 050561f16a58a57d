pub mod getpolicy;
pub mod setpolicy;
