//! 平台安全库
//! 声明式角色、实体访问约束与带变更跟踪的数据上下文

pub mod config;
pub mod data_context;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod telemetry;
