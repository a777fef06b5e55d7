//! 文件夹路径
//!
//! ComfyUI folder_paths 的 Rust 端口: 模型目录表, 文件枚举与完整路径解析

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use lazy_static::lazy_static;
use log::{error, warn};

use crate::{
    core::utils::directory::{filter_files_extensions, recursive_search},
    error::Error,
    wrapper::comfy::file_list_cache::{CacheEntry, FileListCache},
};

// 支持的模型文件扩展名
lazy_static! {
    static ref SUPPORTED_PT_EXTENSIONS: HashSet<&'static str> = {
        let mut set = HashSet::new();
        set.insert(".ckpt");
        set.insert(".pt");
        set.insert(".pt2");
        set.insert(".bin");
        set.insert(".pth");
        set.insert(".safetensors");
        set.insert(".pkl");
        set.insert(".sft");
        set
    };
}

/// 文件夹路径配置结构体
#[allow(clippy::type_complexity)]
#[derive(Debug)]
pub struct FolderPaths {
    /// 基础路径 (ComfyUI 根目录)
    base_path: PathBuf,
    /// 模型路径
    model_path: PathBuf,
    /// 文件夹名称和路径映射 (folders, extensions)
    folder_names_and_paths: BTreeMap<&'static str, (Vec<PathBuf>, HashSet<&'static str>)>,
}

impl Default for FolderPaths {
    /// 以当前工作目录作为 ComfyUI 根目录
    fn default() -> Self {
        let base_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_base_directory(base_path)
    }
}

impl FolderPaths {
    /// 创建新的FolderPaths实例
    pub fn from_base_directory(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        let models_dir = base_path.join("models");
        let folder_names_and_paths = Self::init_folder_names_and_paths(&base_path, &models_dir);

        Self {
            base_path,
            model_path: models_dir,
            folder_names_and_paths,
        }
    }

    fn init_folder_names_and_paths(
        base_path: &Path,
        models_dir: &Path,
    ) -> BTreeMap<&'static str, (Vec<PathBuf>, HashSet<&'static str>)> {
        let mut folder_names_and_paths = BTreeMap::new();

        // 单目录的模型文件夹
        for folder_name in [
            "checkpoints",
            "loras",
            "vae",
            "clip_vision",
            "embeddings",
            "controlnet",
            "upscale_models",
        ] {
            folder_names_and_paths.insert(
                folder_name,
                (
                    vec![models_dir.join(folder_name)],
                    SUPPORTED_PT_EXTENSIONS.clone(),
                ),
            );
        }

        // 带旧目录别名的模型文件夹
        folder_names_and_paths.insert(
            "text_encoders",
            (
                vec![models_dir.join("text_encoders"), models_dir.join("clip")],
                SUPPORTED_PT_EXTENSIONS.clone(),
            ),
        );

        folder_names_and_paths.insert(
            "diffusion_models",
            (
                vec![models_dir.join("unet"), models_dir.join("diffusion_models")],
                SUPPORTED_PT_EXTENSIONS.clone(),
            ),
        );

        folder_names_and_paths.insert(
            "configs",
            (vec![models_dir.join("configs")], {
                let mut set = HashSet::new();
                set.insert(".yaml");
                set
            }),
        );

        folder_names_and_paths.insert(
            "custom_nodes",
            (vec![base_path.join("custom_nodes")], HashSet::new()),
        );

        folder_names_and_paths
    }

    /// 获取基础路径
    pub fn base_path(&self) -> PathBuf {
        self.base_path.clone()
    }

    /// 获取模型路径
    pub fn model_path(&self) -> PathBuf {
        self.model_path.clone()
    }

    /// 获取文件夹路径映射
    pub fn folder_names_and_paths(
        &self,
    ) -> &BTreeMap<&'static str, (Vec<PathBuf>, HashSet<&'static str>)> {
        &self.folder_names_and_paths
    }

    /// 旧文件夹名称映射
    pub fn map_legacy(folder_name: &str) -> &str {
        match folder_name {
            "unet" => "diffusion_models",
            "clip" => "text_encoders",
            _ => folder_name,
        }
    }

    /// 获取指定文件夹的目录列表
    pub fn get_folder_paths(&self, folder_name: &str) -> Result<Vec<PathBuf>, Error> {
        let folder_name = Self::map_legacy(folder_name);

        let (paths, _) = self
            .folder_names_and_paths
            .get(folder_name)
            .ok_or_else(|| Error::InvalidDirectory(format!("folder {folder_name} not found")))?;
        Ok(paths.clone())
    }

    /// 获取完整文件路径
    pub fn get_full_path(
        &self,
        folder_name: &str,
        filename: &str,
    ) -> Result<Option<PathBuf>, Error> {
        let folder_name = Self::map_legacy(folder_name);

        let (dir_paths, _) = self
            .folder_names_and_paths
            .get(folder_name)
            .ok_or_else(|| Error::InvalidDirectory(format!("folder {folder_name} not found")))?;

        // 规范化文件名, 防止越过文件夹根
        let normalized_filename = Path::new("/")
            .join(filename)
            .strip_prefix("/")
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| PathBuf::from(filename));

        for dir_path in dir_paths {
            let full_path = dir_path.join(&normalized_filename);

            if let Ok(metadata) = fs::symlink_metadata(&full_path) {
                if metadata.is_file() {
                    return Ok(Some(full_path));
                } else if metadata.file_type().is_symlink() && fs::metadata(&full_path).is_err() {
                    // 悬空符号链接
                    warn!(
                        "WARNING path {} exists but doesn't link anywhere, skipping.",
                        full_path.display()
                    );
                }
            }
        }

        Ok(None)
    }

    /// 获取完整文件路径, 文件不存在时报错
    pub fn get_full_path_or_raise(
        &self,
        folder_name: &str,
        filename: &str,
    ) -> Result<PathBuf, Error> {
        self.get_full_path(folder_name, filename)?.ok_or_else(|| {
            Error::ModelFileNotFound(folder_name.to_string(), filename.to_string())
        })
    }

    /// 获取文件名列表
    pub fn get_filename_list(&self, folder_name: &str) -> Vec<String> {
        let folder_name = Self::map_legacy(folder_name);

        if let Some(entry) = self.cached_filename_list(folder_name) {
            return entry.files;
        }

        // 重新枚举并更新缓存
        let entry = self.scan_filename_list(folder_name);
        if let Err(e) = FileListCache.set(folder_name.to_string(), entry.clone()) {
            error!("failed to update file list cache, {e}");
        }

        entry.files
    }

    /// 从缓存中获取文件列表
    fn cached_filename_list(&self, folder_name: &str) -> Option<CacheEntry> {
        let entry = match FileListCache.get(folder_name) {
            Ok(Some(entry)) => entry,
            Ok(None) | Err(_) => return None,
        };

        // 目录修改时间变化即失效
        if !entry.is_valid() {
            return None;
        }

        // 缓存后新出现的目录也视为失效
        if let Some((dir_paths, _)) = self.folder_names_and_paths.get(folder_name) {
            for dir_path in dir_paths {
                if !dir_path.is_dir() {
                    continue;
                }
                if !entry
                    .dir_mtimes
                    .contains_key(&dir_path.to_string_lossy().to_string())
                {
                    return None;
                }
            }
        }

        Some(entry)
    }

    /// 枚举文件夹下的全部文件名
    fn scan_filename_list(&self, folder_name: &str) -> CacheEntry {
        let mut output_list = HashSet::new();
        let mut dir_mtimes = BTreeMap::new();

        if let Some((dir_paths, extensions)) = self.folder_names_and_paths.get(folder_name) {
            let extensions_vec: Vec<String> = extensions
                .iter()
                .map(|s| s.to_string())
                .filter(|ext| !ext.is_empty())
                .collect();

            for dir_path in dir_paths {
                let (files, dirs) =
                    recursive_search(dir_path.to_string_lossy().as_ref(), &[".git"]);
                dir_mtimes.extend(dirs);
                output_list.extend(filter_files_extensions(&files, &extensions_vec));
            }
        }

        let mut sorted_list: Vec<String> = output_list.into_iter().collect();
        sorted_list.sort_unstable();

        CacheEntry {
            files: sorted_list,
            dir_mtimes,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|v| v.as_secs_f64())
                .unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_table() {
        let folder_paths = FolderPaths::from_base_directory("/srv/comfyui");
        assert!(folder_paths
            .folder_names_and_paths()
            .contains_key("checkpoints"));
        assert!(folder_paths
            .folder_names_and_paths()
            .contains_key("embeddings"));
        assert_eq!(
            folder_paths.model_path(),
            PathBuf::from("/srv/comfyui/models")
        );
    }

    #[test]
    fn test_map_legacy() {
        assert_eq!(FolderPaths::map_legacy("unet"), "diffusion_models");
        assert_eq!(FolderPaths::map_legacy("clip"), "text_encoders");
        assert_eq!(FolderPaths::map_legacy("checkpoints"), "checkpoints");
    }

    #[test]
    fn test_get_folder_paths_unknown_folder() {
        let folder_paths = FolderPaths::from_base_directory("/srv/comfyui");
        assert!(folder_paths.get_folder_paths("not_a_folder").is_err());
    }

    #[test]
    fn test_get_full_path_missing_file() -> anyhow::Result<()> {
        let folder_paths = FolderPaths::from_base_directory("/srv/comfyui");
        let found = folder_paths.get_full_path("checkpoints", "missing.safetensors")?;
        assert!(found.is_none());
        Ok(())
    }

    #[test]
    fn test_get_full_path_or_raise_missing_file() {
        let folder_paths = FolderPaths::from_base_directory("/srv/comfyui");
        let result = folder_paths.get_full_path_or_raise("checkpoints", "missing.safetensors");
        assert!(matches!(result, Err(Error::ModelFileNotFound(_, _))));
    }

    #[test]
    fn test_get_filename_list_missing_directory_is_empty() {
        let folder_paths = FolderPaths::from_base_directory("/srv/comfyui_not_there");
        assert!(folder_paths.get_filename_list("checkpoints").is_empty());
    }
}
