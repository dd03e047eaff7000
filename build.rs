use color_eyre::Result;
use color_eyre::eyre::{eyre, OptionExt};
use naga::{
    back::spv,
    front::wgsl,
    valid::{Capabilities, ValidationFlags, Validator},
};
use std::{env, fs, path::Path};

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=shaders/src");

    compile_shaders()?;

    Ok(())
}

fn compile_shaders() -> Result<()> {
    let cargo_manifest_dir = env::var("CARGO_MANIFEST_DIR")?;
    let shaders_in_dir = Path::new(&cargo_manifest_dir).join("shaders").join("src");
    let shaders_out_dir = Path::new(&cargo_manifest_dir).join("shaders");

    for entry in fs::read_dir(shaders_in_dir)? {
        let entry = entry?;
        let path = entry.path();

        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_eyre(format!("Shader file has no extension: {:?}", path))?;
        if ext != "wgsl" {
            println!("cargo:warning=Skipping non-WGSL file: {:?}", path);
            continue;
        }

        // Read the WGSL file and parse into IR
        let source = fs::read_to_string(&path)?;
        let module = wgsl::parse_str(&source)
            .map_err(|e| eyre!("{}", e.emit_to_string(&source)))?;

        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        let validation_info = validator
            .validate(&module)
            .map_err(|e| eyre!("{}", e.emit_to_string(&source)))?;

        // Y is flipped by the viewport at draw time
        let mut options = spv::Options::default();
        options.flags.remove(spv::WriterFlags::ADJUST_COORDINATE_SPACE);
        let spv_binary = spv::write_vec(&module, &validation_info, &options, None)?;

        // vert.wgsl -> shaders/vert.spv
        let shader_name = path
            .file_stem()
            .ok_or_eyre("Shader file has no name")?
            .to_str()
            .ok_or_eyre("Shader file name is not valid UTF-8")?;
        let output_filepath = shaders_out_dir.join(format!("{}.spv", shader_name));
        fs::create_dir_all(&shaders_out_dir)?;
        fs::write(output_filepath, bytemuck::cast_slice::<u32, u8>(&spv_binary))?;
    }

    Ok(())
}
