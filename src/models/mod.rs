pub mod market;
pub mod portfolio;
pub mod token;
pub mod wallet;
