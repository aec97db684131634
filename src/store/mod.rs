pub mod deliveries;
pub mod orders;
pub mod settings;
pub mod staff;
