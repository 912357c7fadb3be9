mod devices;
mod interfaces;
mod inventory;
mod topology;

pub use devices::*;
pub use interfaces::*;
pub use inventory::*;
pub use topology::*;
