// SPDX-License-Identifier: CEPL-1.0
use std::{env, fs, path::PathBuf};

// binding 0, location 0: R32G32_SFLOAT (pos)
// binding 0, location 1: R32G32B32_SFLOAT (color)
const TRIANGLE_VERT: &str = r#"
#version 450
layout(location = 0) in vec2 inPos;
layout(location = 1) in vec3 inColor;

layout(location = 0) out vec3 vColor;

void main() {
    vColor = inColor;
    gl_Position = vec4(inPos, 0.0, 1.0);
}
"#;

const TRIANGLE_FRAG: &str = r#"
#version 450
layout(location = 0) in vec3 vColor;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = vec4(vColor, 1.0);
}
"#;

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR set by cargo"));

    let compiler = shaderc::Compiler::new().expect("shaderc compiler");
    let mut opts = shaderc::CompileOptions::new().expect("shaderc options");
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let shaders = [
        (TRIANGLE_VERT, shaderc::ShaderKind::Vertex, "triangle.vert"),
        (TRIANGLE_FRAG, shaderc::ShaderKind::Fragment, "triangle.frag"),
    ];
    for (src, kind, name) in shaders {
        let spv = compiler
            .compile_into_spirv(src, kind, name, "main", Some(&opts))
            .unwrap_or_else(|err| panic!("{name}: {err}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8())
            .unwrap_or_else(|err| panic!("write {name}.spv: {err}"));
    }

    println!("cargo:rerun-if-changed=build.rs");
}
