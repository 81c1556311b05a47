//! Integration test modules

mod change_polling;
mod project_discovery;
mod test_utils;
