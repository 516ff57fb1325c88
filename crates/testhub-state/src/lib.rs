pub mod branches;
pub mod commits;
pub mod completion;
pub mod db;
pub mod memberships;
pub mod schema;
mod sql;
pub mod submissions;
pub mod test_cases;
pub mod test_instances;
