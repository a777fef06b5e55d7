//! torch.nn 包装

pub mod conv2d;
