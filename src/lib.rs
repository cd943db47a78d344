pub mod config;
pub mod device;
pub mod input;
pub mod link;
pub mod messages;
pub mod model;
pub mod motor;
pub mod peripherals;
pub mod plan;
pub mod platform;
pub mod reconnect;
pub mod robot;
pub mod runtime;
pub mod sim;
