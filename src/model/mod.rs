//! 模型

use pyo3::{
    types::{PyModule, PyModuleMethods},
    Bound, PyResult, Python,
};

use crate::core::node::NodeRegister;

mod checkpoint_loader_tg;
pub use checkpoint_loader_tg::CheckpointLoaderTg;

/// 模型模块
pub fn submodule(py: Python<'_>) -> PyResult<Bound<'_, PyModule>> {
    let submodule = PyModule::new(py, "model")?;
    submodule.add_class::<CheckpointLoaderTg>()?;
    Ok(submodule)
}

/// model node register
pub fn node_register(py: Python<'_>) -> PyResult<Vec<NodeRegister<'_>>> {
    let nodes: Vec<NodeRegister> = vec![NodeRegister(
        "CheckpointLoaderTG",
        py.get_type::<CheckpointLoaderTg>(),
        "Checkpoint Loader TG",
    )];
    Ok(nodes)
}
