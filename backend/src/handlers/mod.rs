pub mod admin;
pub mod audit;
pub mod buses;
pub mod driver;
pub mod health;
