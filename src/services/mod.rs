mod resolver;

pub use resolver::{ContentResolver, Resolved};
