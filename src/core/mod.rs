pub mod article;
pub mod category;
pub mod corpus;
pub mod paths;
pub mod query;
