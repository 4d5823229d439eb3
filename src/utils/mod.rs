//! 通用工具

pub mod archive;
pub mod convert;
pub mod crypto;
pub mod diff;
pub mod excel;
pub mod file;
pub mod helper;
pub mod ip;
pub mod money;
pub mod random;
pub mod region;
pub mod slice;
pub mod strings;
pub mod time;
pub mod tree;
