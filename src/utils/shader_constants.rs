//! Built-in WGSL sources
//!
//! Post-processing fragments share one full-screen vertex stage, which is
//! prepended by [`fullscreen_shader`] before the module is validated and
//! compiled.

/// Full-screen triangle vertex stage (`vs_main`) and its `VSOut` struct
pub const FULLSCREEN_VERTEX: &str = include_str!("../assets/shaders/fullscreen.wgsl");

/// Wireframe scene pass, complete module
pub const WIREFRAME_SHADER: &str = include_str!("../assets/shaders/wireframe.wgsl");

pub const BLOOM_BRIGHT_FRAGMENT: &str = include_str!("../assets/shaders/bloom_bright.wgsl");
pub const BLOOM_BLUR_FRAGMENT: &str = include_str!("../assets/shaders/bloom_blur.wgsl");
pub const BLOOM_COMPOSITE_FRAGMENT: &str = include_str!("../assets/shaders/bloom_composite.wgsl");
pub const OUTPUT_FRAGMENT: &str = include_str!("../assets/shaders/output.wgsl");

/// Prepend the shared vertex stage to a post-processing fragment
pub fn fullscreen_shader(fragment: &str) -> String {
    format!("{}\n\n{}", FULLSCREEN_VERTEX, fragment)
}

/// Every module the renderer compiles, by label
pub fn builtin_shaders() -> Vec<(&'static str, String)> {
    vec![
        ("wireframe", WIREFRAME_SHADER.to_string()),
        ("bloom_bright", fullscreen_shader(BLOOM_BRIGHT_FRAGMENT)),
        ("bloom_blur", fullscreen_shader(BLOOM_BLUR_FRAGMENT)),
        ("bloom_composite", fullscreen_shader(BLOOM_COMPOSITE_FRAGMENT)),
        ("output", fullscreen_shader(OUTPUT_FRAGMENT)),
    ]
}
