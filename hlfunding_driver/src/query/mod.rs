mod common;
pub use self::common::{xpath_literal, XPathQuery};

mod dashboard;
pub use self::dashboard::{row_queries, table_queries, timeframe_button_queries};
