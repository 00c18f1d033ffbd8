pub mod coffees;
pub mod general;

pub use coffees::{create_coffee, delete_coffee, get_coffee, list_coffees, update_coffee};
pub use general::health_check;
