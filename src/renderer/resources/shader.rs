use std::io::Cursor;
use std::path::Path;
use ash::vk;
use color_eyre::Result;

use crate::renderer::error::RenderError;

/// Vertex and fragment modules, destroyed when dropped.
///
/// Modules are only needed while a pipeline is being created.
pub struct GraphicsShader<'a> {
    pub vert_mod: vk::ShaderModule,
    pub frag_mod: vk::ShaderModule,
    device: &'a ash::Device,
}

impl<'a> GraphicsShader<'a> {
    pub fn new(
        vertex_path: &Path,
        fragment_path: &Path,
        device: &'a ash::Device,
    ) -> Result<Self> {
        let vert_code = read_spirv(vertex_path)?;
        let frag_code = read_spirv(fragment_path)?;

        let vert_mod = create_shader_module(&vert_code, device)?;
        let frag_mod = match create_shader_module(&frag_code, device) {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.destroy_shader_module(vert_mod, None) };
                return Err(e);
            }
        };
        log::debug!("Loaded shaders {:?} and {:?}", vertex_path, fragment_path);

        Ok(Self { vert_mod, frag_mod, device })
    }
}

impl Drop for GraphicsShader<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.vert_mod, None);
            self.device.destroy_shader_module(self.frag_mod, None);
        }
    }
}

/// Reads a whole SPIR-V binary into properly aligned words
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let shader_load = |source| RenderError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };
    let bytes = std::fs::read(path).map_err(shader_load)?;
    let code = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(shader_load)?;
    Ok(code)
}

fn create_shader_module(code: &[u32], device: &ash::Device) -> Result<vk::ShaderModule> {
    let shader_module_info = vk::ShaderModuleCreateInfo::default().code(code);
    let shader_module = unsafe { device.create_shader_module(&shader_module_info, None) }
        .map_err(RenderError::init("shader module"))?;
    Ok(shader_module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("vkshell-{}-{}", std::process::id(), name));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn assert_shader_load(err: color_eyre::Report, expected: &Path) {
        match err.downcast_ref::<RenderError>() {
            Some(RenderError::ShaderLoad { path, .. }) => assert_eq!(path, expected),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_a_shader_load_error() {
        let path = std::env::temp_dir().join("vkshell-does-not-exist.spv");
        let err = read_spirv(&path).unwrap_err();
        assert_shader_load(err, &path);
    }

    #[test]
    fn truncated_bytecode_is_rejected() {
        let path = temp_file("truncated.spv", &[0x03, 0x02, 0x23]);
        let err = read_spirv(&path).unwrap_err();
        assert_shader_load(err, &path);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn bytecode_without_magic_is_rejected() {
        let path = temp_file("no-magic.spv", &[0u8; 8]);
        let err = read_spirv(&path).unwrap_err();
        assert_shader_load(err, &path);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn whole_binary_is_read() {
        let words = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        let bytes = words.iter().flat_map(|w| w.to_le_bytes()).collect::<Vec<u8>>();
        let path = temp_file("valid.spv", &bytes);
        assert_eq!(read_spirv(&path).unwrap(), words);
        std::fs::remove_file(path).ok();
    }
}
