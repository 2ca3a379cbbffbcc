// Build script to compile GLSL shaders to SPIR-V
//
// Uses naga so the build does not depend on glslc being installed.
// Output lands in OUT_DIR and is embedded with include_bytes!.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use naga::back::spv;
use naga::valid::{Capabilities, ValidationFlags, Validator};

fn main() {
    println!("cargo:rerun-if-changed=shaders/");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    compile_shader(
        "shaders/triangle.vert",
        naga::ShaderStage::Vertex,
        &out_dir.join("triangle.vert.spv"),
    );
    compile_shader(
        "shaders/triangle.frag",
        naga::ShaderStage::Fragment,
        &out_dir.join("triangle.frag.spv"),
    );
}

fn compile_shader(input: &str, stage: naga::ShaderStage, output: &Path) {
    println!("cargo:rerun-if-changed={}", input);

    let source = fs::read_to_string(input)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", input, e));

    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(stage), &source)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {:?}", input, e));

    let info = Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .unwrap_or_else(|e| panic!("Failed to validate {}: {:?}", input, e));

    // The sources are written for Vulkan clip space already
    let mut options = spv::Options::default();
    options.flags.remove(spv::WriterFlags::ADJUST_COORDINATE_SPACE);

    let words = spv::write_vec(&module, &info, &options, None)
        .unwrap_or_else(|e| panic!("Failed to emit SPIR-V for {}: {:?}", input, e));

    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    fs::write(output, bytes)
        .unwrap_or_else(|e| panic!("Failed to write {}: {}", output.display(), e));
}
