pub mod controller;
mod poller;

#[cfg(test)]
mod controller_tests;

pub use controller::AlarmEngine;
