pub mod app;
pub mod coffee;
pub mod error;
pub mod handlers;

pub use app::{AppState, SharedAppState, create_app};
pub use coffee::{Coffee, CoffeeDraft, Store, StoreError};
pub use error::{AppError, AppResult};
