pub mod cancel;
pub mod event;
pub mod heartbeat;
pub mod notify;
pub mod reactor;
pub mod registry;
pub mod sampler;
pub mod state;
pub mod telemetry;
pub mod time;
