//! comfy.sd 检查点加载
//!
//! 相关实现: ComfyUI/comfy/sd.py

use std::path::{Path, PathBuf};

use pyo3::{
    types::{PyAnyMethods, PyDict},
    Bound, PyAny, Python,
};

use crate::error::Error;

/// 加载检查点, 由 comfy.sd 推断模型配置
///
/// 返回 (denoising model, text encoder, vae)
pub fn load_checkpoint_guess_config<'py>(
    py: Python<'py>,
    ckpt_path: &Path,
    embedding_directories: &[PathBuf],
) -> Result<(Bound<'py, PyAny>, Bound<'py, PyAny>, Bound<'py, PyAny>), Error> {
    let sd = py.import("comfy.sd")?;

    let embedding_directories = embedding_directories
        .iter()
        .map(|v| v.to_string_lossy().to_string())
        .collect::<Vec<String>>();

    let kwargs = PyDict::new(py);
    kwargs.set_item("output_vae", true)?;
    kwargs.set_item("output_clip", true)?;
    kwargs.set_item("embedding_directory", embedding_directories)?;

    // 返回值为 (model, clip, vae, clipvision), 只取前三项
    let out = sd.getattr("load_checkpoint_guess_config")?.call(
        (ckpt_path.to_string_lossy().to_string(),),
        Some(&kwargs),
    )?;

    Ok((out.get_item(0)?, out.get_item(1)?, out.get_item(2)?))
}
