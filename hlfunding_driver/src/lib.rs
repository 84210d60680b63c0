mod errors;
pub mod query;
mod session;
pub mod status;
mod user_agent;
mod webdriver;
pub use self::errors::Error;
pub use self::session::{BrowserSession, SessionConnector};
pub use self::user_agent::get_user_agent;
pub use self::webdriver::{SessionConfig, WebDriverConnector, WebDriverSession};
