//! 数据访问辅助：查询条件、分页、层级路径与逗号分隔 id

pub mod ids;
pub mod page;
pub mod path;
pub mod query;
