pub mod migrations;
pub mod schema;
pub mod users;
pub mod websites;
