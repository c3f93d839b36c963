pub mod alarm;
pub mod clock;
pub mod config;
pub mod fakes;
pub mod flags;
pub mod injector;
pub mod notifications;
pub mod power;
pub mod resources;
pub mod schedule;
pub mod service;
pub mod services;

pub use crate::service::{BootNotifier, BootNotifierBuilder};
