//! 目录操作

use std::{collections::BTreeMap, path::Path, time::UNIX_EPOCH};

use walkdir::{DirEntry, WalkDir};

use crate::error::Error;

/// 递归搜索目录
///
/// 返回相对于搜索目录的文件列表, 以及遍历到的子目录及其修改时间
pub fn recursive_search(
    directory: &str,
    excluded_dir_names: &[&str],
) -> (Vec<String>, BTreeMap<String, f64>) {
    let mut files = Vec::new();
    let mut dirs = BTreeMap::new();

    let dir_path = Path::new(directory);
    if !dir_path.is_dir() {
        return (files, dirs);
    }

    let walker = WalkDir::new(directory)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, excluded_dir_names));

    for entry in walker.filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            // 获取相对于搜索目录的路径
            if let Some(rel_str) = entry
                .path()
                .strip_prefix(dir_path)
                .ok()
                .and_then(|p| p.to_str())
            {
                files.push(rel_str.to_string());
            }
        } else if entry.file_type().is_dir() {
            if let Some(path) = entry.path().to_str() {
                if let Ok(mtime) = get_mtime(path) {
                    dirs.insert(path.to_string(), mtime);
                }
            }
        }
    }

    (files, dirs)
}

/// 检查是否为排除目录
fn is_excluded_dir(entry: &DirEntry, excluded_names: &[&str]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }

    entry
        .file_name()
        .to_str()
        .map(|name| excluded_names.contains(&name))
        .unwrap_or(false)
}

/// 过滤文件扩展名
pub fn filter_files_extensions(files: &[String], extensions: &[String]) -> Vec<String> {
    if extensions.is_empty() {
        return files.to_vec();
    }

    // 预处理扩展名: 去掉点并转为小写
    let normalized_exts: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    files
        .iter()
        .filter(|file| {
            Path::new(file)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| normalized_exts.iter().any(|e| e == &ext.to_lowercase()))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// 获取目录修改时间
pub fn get_mtime(path: &str) -> Result<f64, Error> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)?
        .as_secs_f64();
    Ok(mtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_files_extensions() {
        let files = vec![
            "sd15.safetensors".to_string(),
            "v2-inference.yaml".to_string(),
            "notes.txt".to_string(),
            "sdxl.CKPT".to_string(),
        ];

        let filtered = filter_files_extensions(
            &files,
            &[".safetensors".to_string(), ".ckpt".to_string()],
        );
        assert_eq!(filtered, vec!["sd15.safetensors", "sdxl.CKPT"]);
    }

    #[test]
    fn test_filter_files_extensions_empty_filter() {
        let files = vec!["a.bin".to_string(), "b".to_string()];
        assert_eq!(filter_files_extensions(&files, &[]), files);
    }

    #[test]
    fn test_get_mtime() -> anyhow::Result<()> {
        let mtime = get_mtime("Cargo.toml")?;
        assert!(mtime > 0.0);
        Ok(())
    }

    #[test]
    fn test_get_mtime_missing_path() {
        assert!(get_mtime("no_such_directory_here").is_err());
    }
}
