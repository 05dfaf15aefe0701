pub mod camera;

pub use camera::{ManualTrigger, SimulatedCamera};
