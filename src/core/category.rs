//! 节点分类

/// 模型
pub const CATEGORY_MODEL: &str = "TileGeneration/Model";
