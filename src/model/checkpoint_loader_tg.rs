//! 平铺生成检查点加载器
//!
//! 加载扩散模型检查点; periodic=1 时给 torch.nn.Conv2d 安装
//! circular padding 覆盖, 之后构建的模型输出可无缝平铺

use log::error;
use pyo3::{
    exceptions::PyRuntimeError,
    pyclass, pymethods,
    types::{PyAnyMethods, PyDict, PyType},
    Bound, Py, PyAny, PyErr, PyResult, Python,
};

use crate::{
    core::category::CATEGORY_MODEL,
    error::Error,
    wrapper::{
        comfy::{folder_paths::FolderPaths, sd},
        comfyui::{
            types::{NODE_CLIP, NODE_INT, NODE_MODEL, NODE_VAE},
            PromptServer,
        },
        torch::nn::conv2d::{self, Conv2dPatch},
    },
};

/// 检查点加载器, 支持周期性生成配置
#[pyclass(subclass)]
pub struct CheckpointLoaderTg {}

impl PromptServer for CheckpointLoaderTg {}

#[pymethods]
impl CheckpointLoaderTg {
    #[new]
    fn new() -> Self {
        Self {}
    }

    // 输入列表, 可选
    #[classattr]
    #[pyo3(name = "INPUT_IS_LIST")]
    fn input_is_list() -> bool {
        false
    }

    // 返回参数类型
    #[classattr]
    #[pyo3(name = "RETURN_TYPES")]
    fn return_types() -> (&'static str, &'static str, &'static str) {
        (NODE_MODEL, NODE_CLIP, NODE_VAE)
    }

    // 返回参数名称
    #[classattr]
    #[pyo3(name = "RETURN_NAMES")]
    fn return_names() -> (&'static str, &'static str, &'static str) {
        ("MODEL", "CLIP", "VAE")
    }

    // 返回参数提示
    #[classattr]
    #[pyo3(name = "OUTPUT_TOOLTIPS")]
    fn output_tooltips() -> (&'static str, &'static str, &'static str) {
        (
            "The model used for denoising latents.",
            "The CLIP model used for encoding text prompts.",
            "The VAE model used for encoding and decoding images to and from latent space.",
        )
    }

    // 输出列表, 可选
    #[classattr]
    #[pyo3(name = "OUTPUT_IS_LIST")]
    fn output_is_list() -> (bool, bool, bool) {
        (false, false, false)
    }

    // 节点分类
    #[classattr]
    #[pyo3(name = "CATEGORY")]
    const CATEGORY: &'static str = CATEGORY_MODEL;

    // 节点描述, 可选
    #[classattr]
    #[pyo3(name = "DESCRIPTION")]
    fn description() -> &'static str {
        "Loads a diffusion model checkpoint, diffusion models are used to denoise latents."
    }

    #[classattr]
    #[pyo3(name = "FUNCTION")]
    const FUNCTION: &'static str = "execute";

    #[classmethod]
    #[pyo3(name = "INPUT_TYPES")]
    fn input_types(_cls: &Bound<'_, PyType>) -> PyResult<Py<PyDict>> {
        Python::with_gil(|py| {
            let dict = PyDict::new(py);
            dict.set_item("required", {
                let required = PyDict::new(py);

                required.set_item(
                    "ckpt_name",
                    (Self::checkpoint_list(), {
                        let params = PyDict::new(py);
                        params
                            .set_item("tooltip", "The name of the checkpoint (model) to load.")?;
                        params
                    }),
                )?;

                required.set_item(
                    "periodic",
                    (NODE_INT, {
                        let params = PyDict::new(py);
                        params.set_item("default", 0)?;
                        params.set_item("min", 0)?;
                        params.set_item("max", 1)?;
                        params.set_item(
                            "tooltip",
                            "1: patch every Conv2d to circular padding for seamlessly tileable output. 0: keep default padding.",
                        )?;
                        params
                    }),
                )?;

                required
            })?;

            Ok(dict.into())
        })
    }

    #[pyo3(name = "execute")]
    fn execute<'py>(
        &mut self,
        py: Python<'py>,
        ckpt_name: &str,
        periodic: u8,
    ) -> PyResult<(Bound<'py, PyAny>, Bound<'py, PyAny>, Bound<'py, PyAny>)> {
        let results = self.load_checkpoint(py, ckpt_name, periodic);

        match results {
            Ok(v) => Ok(v),
            Err(e) => {
                error!("CheckpointLoaderTG error, {e}");
                if let Err(e) =
                    self.send_error(py, "CheckpointLoaderTG".to_string(), e.to_string())
                {
                    error!("send error failed, {e}");
                    return Err(PyErr::new::<PyRuntimeError, _>(e.to_string()));
                };
                Err(PyErr::new::<PyRuntimeError, _>(e.to_string()))
            }
        }
    }
}

impl CheckpointLoaderTg {
    /// 获取检查点文件列表
    fn checkpoint_list() -> Vec<String> {
        FolderPaths::default().get_filename_list("checkpoints")
    }

    /// periodic 标志到 Conv2d 覆盖配置的映射
    fn conv_patch(periodic: u8) -> Conv2dPatch {
        if periodic == 1 {
            Conv2dPatch::periodic()
        } else {
            Conv2dPatch::default()
        }
    }

    /// 加载检查点
    fn load_checkpoint<'py>(
        &self,
        py: Python<'py>,
        ckpt_name: &str,
        periodic: u8,
    ) -> Result<(Bound<'py, PyAny>, Bound<'py, PyAny>, Bound<'py, PyAny>), Error> {
        // 先安装构造补丁, comfy.sd 在加载过程中构建全部 Conv2d
        conv2d::install(py, &Self::conv_patch(periodic))?;

        let folder_paths = FolderPaths::default();
        let ckpt_path = folder_paths.get_full_path_or_raise("checkpoints", ckpt_name)?;
        let embedding_directories = folder_paths.get_folder_paths("embeddings")?;

        sd::load_checkpoint_guess_config(py, &ckpt_path, &embedding_directories)
    }
}

#[cfg(test)]
mod tests {
    use crate::wrapper::torch::nn::conv2d::PadMode;

    use super::*;

    #[test]
    fn test_conv_patch_default() {
        let patch = CheckpointLoaderTg::conv_patch(0);
        assert!(patch.is_empty());
    }

    #[test]
    fn test_conv_patch_periodic() {
        let patch = CheckpointLoaderTg::conv_patch(1);
        assert_eq!(patch.padding_mode, Some(PadMode::Circular));
    }

    #[test]
    fn test_conv_patch_is_stable() {
        // 同一标志多次映射得到同一配置
        assert_eq!(
            CheckpointLoaderTg::conv_patch(1),
            CheckpointLoaderTg::conv_patch(1)
        );
        assert_eq!(
            CheckpointLoaderTg::conv_patch(0),
            CheckpointLoaderTg::conv_patch(0)
        );
    }
}
