mod analytics;
mod purchase;
mod template;
mod user;

pub use analytics::*;
pub use purchase::*;
pub use template::*;
pub use user::*;
