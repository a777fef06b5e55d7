//! torch.nn.Conv2d 构造补丁
//!
//! 周期性(无缝平铺)生成要求模型内所有 Conv2d 使用 circular padding.
//! comfy.sd 的加载流程内部构建模型, 没有逐层配置入口, 只能在
//! Conv2d 构造函数层面全局注入覆盖参数.

use pyo3::{
    ffi::c_str,
    sync::GILOnceCell,
    types::{PyAnyMethods, PyDict, PyModule},
    Bound, Py, PyAny, Python,
};
use strum_macros::{Display, EnumString};

use crate::error::Error;

/// 原始 Conv2d.__init__, 首次安装补丁前捕获, 进程内只捕获一次.
/// 后续安装始终基于该原始版本, 不会产生补丁叠加
static ORIGINAL_CONV2D_INIT: GILOnceCell<Py<PyAny>> = GILOnceCell::new();

/// Conv2d 支持的 padding_mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
pub enum PadMode {
    #[default]
    #[strum(to_string = "zeros")]
    Zeros,
    #[strum(to_string = "reflect")]
    Reflect,
    #[strum(to_string = "replicate")]
    Replicate,
    #[strum(to_string = "circular")]
    Circular,
}

/// Conv2d 构造参数覆盖配置
///
/// 固定的强类型选项集, 非法值在配置阶段即被拒绝,
/// 不会深入到 torch 的构造校验才暴露
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Conv2dPatch {
    pub padding_mode: Option<PadMode>,
}

impl Conv2dPatch {
    /// 周期性(无缝平铺)配置
    pub fn periodic() -> Self {
        Self {
            padding_mode: Some(PadMode::Circular),
        }
    }

    /// 是否无任何覆盖项
    pub fn is_empty(&self) -> bool {
        self.padding_mode.is_none()
    }

    /// 渲染为 Conv2d 构造覆盖参数
    fn overrides<'py>(&self, py: Python<'py>) -> Result<Bound<'py, PyDict>, Error> {
        let overrides = PyDict::new(py);
        if let Some(mode) = self.padding_mode {
            overrides.set_item("padding_mode", mode.to_string())?;
        }
        Ok(overrides)
    }
}

/// 给 torch.nn.Conv2d 安装构造参数覆盖
///
/// 对之后进程内所有 Conv2d 构造生效, 覆盖项优先于调用方同名参数.
/// 可重复调用: 每次安装完整替换覆盖配置, 空配置恢复默认构造行为
/// (包装层保留, 不存在卸载路径)
pub fn install(py: Python<'_>, patch: &Conv2dPatch) -> Result<(), Error> {
    let conv2d = py.import("torch")?.getattr("nn")?.getattr("Conv2d")?;

    // 必须在第一次替换 __init__ 之前捕获, 否则捕获到的已是补丁版本
    let original = ORIGINAL_CONV2D_INIT
        .get_or_try_init(py, || conv2d.getattr("__init__").map(Into::into))?;

    let factory = PyModule::from_code(
        py,
        c_str!(include_str!("conv2d_patch.py")),
        c"conv2d_patch.py",
        c"conv2d_patch",
    )?;

    // 替换对象必须是 Python 函数: __init__ 槽查找依靠函数的描述符协议绑定实例
    let patched = factory
        .getattr("make_patched_init")?
        .call1((original.bind(py), patch.overrides(py)?))?;
    conv2d.setattr("__init__", patched)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pyo3::types::PyDictMethods;

    use super::*;

    #[test]
    fn test_pad_mode_names() {
        assert_eq!(PadMode::Zeros.to_string(), "zeros");
        assert_eq!(PadMode::Circular.to_string(), "circular");
        assert_eq!(PadMode::from_str("replicate").ok(), Some(PadMode::Replicate));
        assert!(PadMode::from_str("donut").is_err());
    }

    #[test]
    fn test_default_patch_is_empty() {
        let patch = Conv2dPatch::default();
        assert!(patch.is_empty());
        assert_eq!(patch.padding_mode, None);
    }

    #[test]
    fn test_periodic_patch() {
        let patch = Conv2dPatch::periodic();
        assert!(!patch.is_empty());
        assert_eq!(patch.padding_mode, Some(PadMode::Circular));
    }

    #[test]
    #[ignore] // 需要 Python 解释器
    fn test_overrides_rendering() -> anyhow::Result<()> {
        Python::with_gil(|py| -> anyhow::Result<()> {
            let overrides = Conv2dPatch::default().overrides(py)?;
            assert!(overrides.is_empty());

            let overrides = Conv2dPatch::periodic().overrides(py)?;
            assert_eq!(overrides.len(), 1);
            let mode = overrides
                .get_item("padding_mode")?
                .map(|v| v.to_string())
                .unwrap_or_default();
            assert_eq!(mode, "circular");
            Ok(())
        })
    }
}
