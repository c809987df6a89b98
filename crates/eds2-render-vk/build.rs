// SPDX-License-Identifier: CEPL-1.0
use std::{env, fs, path::PathBuf};

// Layout shared with the Rust side:
//   - binding 0, location 0: R32G32B32_SFLOAT position
//   - binding 1, location 1: R32G32B32_SFLOAT normal
//   - set 0 binding 0: BaselineUbo / TessellationUbo
//   - push constants: PushConstantBlock { mat4 model; vec4 color; }

const BASELINE_VERT: &str = r#"
#version 450
layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inNormal;

layout(set = 0, binding = 0) uniform Ubo {
    mat4 projection;
    mat4 view;
} ubo;

layout(push_constant) uniform Push {
    mat4 model;
    vec4 color;
} push;

layout(location = 0) out vec3 outNormal;
layout(location = 1) out vec4 outColor;

void main() {
    outNormal = mat3(transpose(inverse(push.model))) * inNormal;
    outColor = push.color;
    gl_Position = ubo.projection * ubo.view * push.model * vec4(inPos, 1.0);
}
"#;

const BASELINE_FRAG: &str = r#"
#version 450
layout(location = 0) in vec3 inNormal;
layout(location = 1) in vec4 inColor;
layout(location = 0) out vec4 outColor;

void main() {
    vec3 light = normalize(vec3(0.4, 1.0, -0.6));
    float diffuse = max(dot(normalize(inNormal), light), 0.0);
    outColor = vec4(inColor.rgb * (0.25 + 0.75 * diffuse), inColor.a);
}
"#;

const TESS_VERT: &str = r#"
#version 450
layout(location = 0) in vec3 inPos;
layout(location = 1) in vec3 inNormal;

layout(push_constant) uniform Push {
    mat4 model;
    vec4 color;
} push;

layout(location = 0) out vec3 outPos;
layout(location = 1) out vec3 outNormal;

void main() {
    outPos = (push.model * vec4(inPos, 1.0)).xyz;
    outNormal = normalize(mat3(transpose(inverse(push.model))) * inNormal);
}
"#;

const TESS_CTRL: &str = r#"
#version 450
layout(vertices = 3) out;

layout(set = 0, binding = 0) uniform Ubo {
    mat4 projection;
    mat4 view;
    vec4 lightPos;
    float tessellationFactor;
} ubo;

layout(location = 0) in vec3 inPos[];
layout(location = 1) in vec3 inNormal[];
layout(location = 0) out vec3 outPos[3];
layout(location = 1) out vec3 outNormal[3];

void main() {
    if (gl_InvocationID == 0) {
        // 0 means tessellation is switched off
        float level = ubo.tessellationFactor > 0.0 ? ubo.tessellationFactor : 1.0;
        gl_TessLevelInner[0] = level;
        gl_TessLevelOuter[0] = level;
        gl_TessLevelOuter[1] = level;
        gl_TessLevelOuter[2] = level;
    }
    outPos[gl_InvocationID] = inPos[gl_InvocationID];
    outNormal[gl_InvocationID] = inNormal[gl_InvocationID];
}
"#;

// Phong tessellation: blend the planar position with its projections onto
// the corner tangent planes.
const TESS_EVAL: &str = r#"
#version 450
layout(triangles, equal_spacing, ccw) in;

layout(set = 0, binding = 0) uniform Ubo {
    mat4 projection;
    mat4 view;
    vec4 lightPos;
    float tessellationFactor;
} ubo;

layout(push_constant) uniform Push {
    mat4 model;
    vec4 color;
} push;

layout(location = 0) in vec3 inPos[];
layout(location = 1) in vec3 inNormal[];

layout(location = 0) out vec3 outNormal;
layout(location = 1) out vec4 outColor;
layout(location = 2) out vec3 outWorldPos;

vec3 onPlane(vec3 p, vec3 corner, vec3 normal) {
    return p - dot(p - corner, normal) * normal;
}

void main() {
    vec3 b = gl_TessCoord;
    vec3 planar = b.x * inPos[0] + b.y * inPos[1] + b.z * inPos[2];
    vec3 curved = b.x * onPlane(planar, inPos[0], inNormal[0])
                + b.y * onPlane(planar, inPos[1], inNormal[1])
                + b.z * onPlane(planar, inPos[2], inNormal[2]);
    vec3 pos = mix(planar, curved, 0.75);

    outNormal = normalize(b.x * inNormal[0] + b.y * inNormal[1] + b.z * inNormal[2]);
    outColor = push.color;
    outWorldPos = pos;
    gl_Position = ubo.projection * ubo.view * vec4(pos, 1.0);
}
"#;

const TESS_FRAG: &str = r#"
#version 450
layout(set = 0, binding = 0) uniform Ubo {
    mat4 projection;
    mat4 view;
    vec4 lightPos;
    float tessellationFactor;
} ubo;

layout(location = 0) in vec3 inNormal;
layout(location = 1) in vec4 inColor;
layout(location = 2) in vec3 inWorldPos;
layout(location = 0) out vec4 outColor;

void main() {
    vec3 light = normalize(ubo.lightPos.xyz - inWorldPos);
    float diffuse = max(dot(normalize(inNormal), light), 0.0);
    outColor = vec4(inColor.rgb * (0.25 + 0.75 * diffuse), inColor.a);
}
"#;

fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    let comp = shaderc::Compiler::new().expect("shaderc compiler");
    let mut opts = shaderc::CompileOptions::new().expect("shaderc options");
    opts.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_3 as u32,
    );
    opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let shaders = [
        ("baseline.vert", BASELINE_VERT, shaderc::ShaderKind::Vertex),
        ("baseline.frag", BASELINE_FRAG, shaderc::ShaderKind::Fragment),
        ("tess.vert", TESS_VERT, shaderc::ShaderKind::Vertex),
        ("tess.tesc", TESS_CTRL, shaderc::ShaderKind::TessControl),
        ("tess.tese", TESS_EVAL, shaderc::ShaderKind::TessEvaluation),
        ("tess.frag", TESS_FRAG, shaderc::ShaderKind::Fragment),
    ];

    for (name, src, kind) in shaders {
        let spv = comp
            .compile_into_spirv(src, kind, name, "main", Some(&opts))
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8())
            .unwrap_or_else(|e| panic!("write {name}.spv: {e}"));
    }

    println!("cargo:rerun-if-changed=build.rs");
}
