use std::borrow::Cow;

use naga_oil::compose::{ComposableModuleDescriptor, Composer, NagaModuleDescriptor};
use rime_core::render::flow::NodeBuildError;
use thiserror::Error;
use wgpu::{Device, ShaderModule, ShaderModuleDescriptor, ShaderSource};

pub const COMMON_SHADER: &str = include_str!("shader/common.wgsl");
pub const SKYBOX_SHADER: &str = include_str!("shader/skybox.wgsl");
pub const REFLECT_SHADER: &str = include_str!("shader/reflect.wgsl");

#[derive(Error, Debug)]
#[error("Failed to compose shader {name}: {message}")]
pub struct ShaderError {
    pub name: &'static str,
    pub message: String,
}

impl From<ShaderError> for NodeBuildError {
    fn from(err: ShaderError) -> Self {
        NodeBuildError(err.to_string())
    }
}

pub fn add_shader_module(
    composer: &mut Composer,
    name: &'static str,
    shader: &str,
) -> Result<(), ShaderError> {
    composer
        .add_composable_module(ComposableModuleDescriptor {
            source: shader,
            file_path: name,
            ..Default::default()
        })
        .map(|_| ())
        .map_err(|err| ShaderError {
            name,
            message: err.emit_to_string(composer),
        })
}

/// Composes `source` against the shared shader library.
pub fn compose_shader(
    name: &'static str,
    source: &str,
) -> Result<ShaderSource<'static>, ShaderError> {
    let mut composer = Composer::default();
    add_shader_module(&mut composer, "common.wgsl", COMMON_SHADER)?;

    let module = composer
        .make_naga_module(NagaModuleDescriptor {
            source,
            file_path: name,
            ..Default::default()
        })
        .map_err(|err| ShaderError {
            name,
            message: err.emit_to_string(&composer),
        })?;

    Ok(ShaderSource::Naga(Cow::Owned(module)))
}

pub fn create_shader(
    device: &Device,
    name: &'static str,
    source: &str,
) -> Result<ShaderModule, ShaderError> {
    Ok(device.create_shader_module(ShaderModuleDescriptor {
        label: Some(name),
        source: compose_shader(name, source)?,
    }))
}
