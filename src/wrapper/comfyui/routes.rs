//! 自定义 HTTP 路由
//!
//! 注册到 ComfyUI 已有的 aiohttp 服务, 相关实现: ComfyUI/server.py

use pyo3::{
    exceptions::PyRuntimeError,
    ffi::c_str,
    pyfunction,
    types::{PyAnyMethods, PyModule},
    wrap_pyfunction, PyErr, PyResult, Python,
};

use crate::error::Error;

/// `GET /hello` 响应体, JSON 编码的字符串 "hello"
fn hello_payload() -> Result<String, Error> {
    Ok(serde_json::to_string("hello")?)
}

#[pyfunction]
#[pyo3(name = "hello_payload")]
fn py_hello_payload() -> PyResult<String> {
    hello_payload().map_err(|e| PyErr::new::<PyRuntimeError, _>(e.to_string()))
}

/// 在 PromptServer 上注册自定义路由
///
/// 路由装饰器只能作用于 Python 协程, 处理函数定义在内嵌模块中,
/// 响应内容由 Rust 端回调生成
pub fn register_routes(py: Python<'_>) -> PyResult<()> {
    let module = PyModule::from_code(
        py,
        c_str!(include_str!("routes.py")),
        c"routes.py",
        c"tile_generation_routes",
    )?;

    module
        .getattr("register")?
        .call1((wrap_pyfunction!(py_hello_payload, py)?,))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_payload_is_json_string() -> anyhow::Result<()> {
        assert_eq!(hello_payload()?, r#""hello""#);
        Ok(())
    }
}
