//! comfy 包装

pub mod file_list_cache;
pub mod folder_paths;
pub mod sd;
