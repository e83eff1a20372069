pub mod conversation;
pub mod finding;
pub mod test_case;
