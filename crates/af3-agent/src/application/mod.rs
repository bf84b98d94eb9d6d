//! 应用层：端口定义与服务编排

pub mod ports;
pub mod services;
