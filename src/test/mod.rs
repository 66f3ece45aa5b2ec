mod env;
mod utils;

pub use utils::test_utils;
